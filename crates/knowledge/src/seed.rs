//! Built-in CBT technique knowledge.

use cbtsim_core::knowledge::{KnowledgeEntry, KnowledgeKind};

pub const SEED_SOURCE: &str = "builtin";

struct SeedDoc {
    technique: &'static str,
    category: &'static str,
    text: &'static str,
}

const SEED_DOCS: &[SeedDoc] = &[
    SeedDoc {
        technique: "ABC Model",
        category: "cognitive restructuring",
        text: "ABC Model (Activating Event, Belief, Consequence): This foundational CBT technique helps identify the connection between situations, thoughts, and emotional responses. The Activating Event is the trigger situation, the Belief is the thought or interpretation about the event, and the Consequence is the emotional and behavioral response. By examining these three components, clients can identify how their interpretations of events (rather than the events themselves) create their emotional distress. This technique is particularly effective for anxiety, depression, and anger management.",
    },
    SeedDoc {
        technique: "Cognitive Restructuring",
        category: "cognitive restructuring",
        text: "Cognitive Restructuring: This technique involves identifying and challenging negative thought patterns and cognitive distortions. Common distortions include all-or-nothing thinking, catastrophizing, mind reading, and overgeneralization. The process involves: 1) Identifying the negative thought, 2) Examining evidence for and against the thought, 3) Developing balanced, realistic alternative thoughts, 4) Testing these new thoughts behaviorally. This technique is central to treating depression, anxiety disorders, and low self-esteem.",
    },
    SeedDoc {
        technique: "Behavioral Activation",
        category: "behavioral intervention",
        text: "Behavioral Activation: This technique focuses on increasing engagement in meaningful, pleasurable, or mastery-oriented activities. It's based on the principle that behavior influences mood. The process involves: identifying values and goals, scheduling pleasant activities, monitoring mood changes, and gradually increasing activity levels. Behavioral activation is particularly effective for depression, as it helps break the cycle of withdrawal and inactivity that maintains depressive symptoms.",
    },
    SeedDoc {
        technique: "Exposure Therapy",
        category: "behavioral intervention",
        text: "Exposure Therapy: A behavioral technique used primarily for anxiety disorders, phobias, and PTSD. It involves gradual, controlled exposure to feared situations or objects in a safe environment. The exposure can be imaginal (visualizing the feared situation) or in vivo (real-life exposure). The process helps clients learn that their feared consequences are unlikely to occur and that anxiety naturally decreases over time. Systematic desensitization and graded exposure hierarchies are common variations.",
    },
    SeedDoc {
        technique: "Mindfulness",
        category: "acceptance-based",
        text: "Mindfulness and Acceptance Strategies: These techniques, borrowed from third-wave CBT approaches, help clients observe thoughts and feelings without judgment. Mindfulness practices include breathing exercises, body scans, and present-moment awareness. Acceptance strategies involve acknowledging difficult emotions without trying to change them immediately. These techniques are effective for anxiety, depression, chronic pain, and emotional regulation difficulties.",
    },
    SeedDoc {
        technique: "Problem-Solving",
        category: "behavioral intervention",
        text: "Problem-Solving Therapy: A structured approach to addressing specific life problems that contribute to emotional distress. The steps include: 1) Problem identification and definition, 2) Goal setting, 3) Brainstorming solutions, 4) Evaluating pros and cons of each solution, 5) Implementing the chosen solution, 6) Evaluating outcomes. This technique is useful for clients facing concrete life challenges alongside their emotional difficulties.",
    },
];

/// The six built-in technique descriptions, ready for ingestion.
pub fn seed_entries() -> Vec<KnowledgeEntry> {
    SEED_DOCS
        .iter()
        .map(|doc| {
            KnowledgeEntry::new(doc.text, KnowledgeKind::Technique)
                .with_metadata("technique", doc.technique)
                .with_metadata("category", doc.category)
                .with_source(SEED_SOURCE)
        })
        .collect()
}
