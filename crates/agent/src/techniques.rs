//! The closed taxonomy of CBT techniques offered to the technique-selection
//! stage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CbtTechnique {
    AbcModel,
    GuidedDiscovery,
    ExposureTherapy,
    CognitiveRestructuring,
    ActivityScheduling,
    ScenarioAnalysis,
    AcceptanceAndCommitment,
    Journaling,
    BehavioralExperiments,
    RolePlaying,
}

impl CbtTechnique {
    pub const ALL: [CbtTechnique; 10] = [
        CbtTechnique::AbcModel,
        CbtTechnique::GuidedDiscovery,
        CbtTechnique::ExposureTherapy,
        CbtTechnique::CognitiveRestructuring,
        CbtTechnique::ActivityScheduling,
        CbtTechnique::ScenarioAnalysis,
        CbtTechnique::AcceptanceAndCommitment,
        CbtTechnique::Journaling,
        CbtTechnique::BehavioralExperiments,
        CbtTechnique::RolePlaying,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CbtTechnique::AbcModel => "ABC Model",
            CbtTechnique::GuidedDiscovery => "Guided Discovery",
            CbtTechnique::ExposureTherapy => "Exposure Therapy",
            CbtTechnique::CognitiveRestructuring => "Cognitive Restructuring",
            CbtTechnique::ActivityScheduling => "Activity Scheduling",
            CbtTechnique::ScenarioAnalysis => "Worst Case/Best Case/Most Likely Case Scenario",
            CbtTechnique::AcceptanceAndCommitment => "Acceptance and Commitment Therapy",
            CbtTechnique::Journaling => "Journaling",
            CbtTechnique::BehavioralExperiments => "Behavioral Experiments",
            CbtTechnique::RolePlaying => "Role-Playing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CbtTechnique::AbcModel => {
                "Reinterpret irrational beliefs to open up alternative behaviours.\n  \
                 a. Activating Event: the event that leads to distress or dysfunctional thinking\n  \
                 b. Belief: the negative thoughts the event set off\n  \
                 c. Consequences: the feelings and behaviours that followed"
            }
            CbtTechnique::GuidedDiscovery => {
                "See the situation from the client's viewpoint, then ask questions that challenge and broaden their thinking."
            }
            CbtTechnique::ExposureTherapy => {
                "Gradual, controlled contact with a trigger to reduce the response. Uncomfortable at first; useful for phobias."
            }
            CbtTechnique::CognitiveRestructuring => {
                "Find irrational thoughts and reshape them into adaptive, reasonable ones."
            }
            CbtTechnique::ActivityScheduling => {
                "Identify and schedule enjoyable, rewarding behaviours such as hobbies."
            }
            CbtTechnique::ScenarioAnalysis => {
                "Explore the worst, best and most likely outcomes to rationalise a worry and find actionable steps."
            }
            CbtTechnique::AcceptanceAndCommitment => {
                "Accept and make room for difficult feelings instead of fighting or controlling them."
            }
            CbtTechnique::Journaling => {
                "Record thoughts in a journal to build awareness of cognitive errors and personal thinking patterns."
            }
            CbtTechnique::BehavioralExperiments => {
                "Predict what will happen, test it, and review the result. Start with low-anxiety experiments."
            }
            CbtTechnique::RolePlaying => {
                "Rehearse difficult scenarios to lessen fear and build problem-solving, social and communication skills."
            }
        }
    }

    /// Distinctive phrases that count as naming the technique outright.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            CbtTechnique::AbcModel => &["abc model", "activating event"],
            CbtTechnique::GuidedDiscovery => &["guided discovery"],
            CbtTechnique::ExposureTherapy => &["exposure therapy"],
            CbtTechnique::CognitiveRestructuring => &["cognitive restructuring"],
            CbtTechnique::ActivityScheduling => &["activity scheduling"],
            CbtTechnique::ScenarioAnalysis => &["worst case/best case", "most likely case scenario"],
            CbtTechnique::AcceptanceAndCommitment => &["acceptance and commitment"],
            CbtTechnique::Journaling => &["journaling technique"],
            CbtTechnique::BehavioralExperiments => &["behavioral experiment", "behavioural experiment"],
            CbtTechnique::RolePlaying => &["role-playing technique", "role-playing exercise"],
        }
    }

    /// The numbered reference list injected into the technique-selection prompt.
    pub fn reference_list() -> String {
        let mut out = String::from("CBT TECHNIQUES TO USE:\n");
        for (i, t) in Self::ALL.iter().enumerate() {
            out.push_str(&format!("{}. {}: {}\n", i + 1, t.name(), t.description()));
        }
        out
    }

    /// Techniques named explicitly in `text` (case-insensitive).
    pub fn mentioned_in(text: &str) -> Vec<CbtTechnique> {
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .filter(|t| t.aliases().iter().any(|a| lower.contains(a)))
            .collect()
    }
}

impl std::fmt::Display for CbtTechnique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_list_is_numbered_one_to_ten() {
        let list = CbtTechnique::reference_list();
        assert!(list.starts_with("CBT TECHNIQUES TO USE:\n1. ABC Model:"));
        assert!(list.contains("\n10. Role-Playing:"));
        for t in CbtTechnique::ALL {
            assert!(list.contains(t.name()));
        }
    }

    #[test]
    fn detects_explicit_names() {
        let found = CbtTechnique::mentioned_in("Let's try Cognitive Restructuring and some exposure therapy.");
        assert_eq!(
            found,
            vec![CbtTechnique::ExposureTherapy, CbtTechnique::CognitiveRestructuring]
        );
    }

    #[test]
    fn implicit_use_is_not_flagged() {
        let reply = "When that thought shows up, what evidence do you notice for and against it? \
                     Writing a few notes each evening might help you see the pattern.";
        assert!(CbtTechnique::mentioned_in(reply).is_empty());
    }
}
