use serde::{Deserialize, Deserializer, Serialize};

const INSUFFICIENT: &str = "insufficient";
const NOT_MENTIONED: &str = "Not mentioned";
const NO_ADDITIONAL_NOTES: &str = "No additional information available";

// Explicit `null` decodes like an absent field.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| placeholder.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Meals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakfast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lunch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dinner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snacks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lifestyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alcohol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_food: Option<String>,
}

/// Post-call summary of what the caller reported.
///
/// The generator omits or nulls fields it could not extract; decoding fills the gaps with the
/// placeholders the results screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSummary")]
pub struct ConversationSummary {
    pub data_quality: String,
    pub meals: Meals,
    pub exercise: String,
    pub sleep: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beverages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifestyle: Option<Lifestyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mental_health: Option<String>,
    pub additional_notes: String,
}

#[derive(Default, Deserialize)]
struct RawSummary {
    #[serde(default)]
    data_quality: Option<String>,
    #[serde(default)]
    meals: Option<Meals>,
    #[serde(default)]
    exercise: Option<String>,
    #[serde(default)]
    sleep: Option<String>,
    #[serde(default)]
    beverages: Option<String>,
    #[serde(default)]
    lifestyle: Option<Lifestyle>,
    #[serde(default)]
    mental_health: Option<String>,
    #[serde(default)]
    additional_notes: Option<String>,
}

impl From<RawSummary> for ConversationSummary {
    fn from(raw: RawSummary) -> Self {
        Self {
            data_quality: or_placeholder(raw.data_quality, INSUFFICIENT),
            meals: raw.meals.unwrap_or_default(),
            exercise: or_placeholder(raw.exercise, NOT_MENTIONED),
            sleep: or_placeholder(raw.sleep, NOT_MENTIONED),
            beverages: raw.beverages,
            lifestyle: raw.lifestyle,
            mental_health: raw.mental_health,
            additional_notes: or_placeholder(raw.additional_notes, NO_ADDITIONAL_NOTES),
        }
    }
}

/// All placeholders; what the results screen shows when the generator returned nothing usable.
impl Default for ConversationSummary {
    fn default() -> Self {
        RawSummary::default().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GoalStatus {
    #[serde(rename = "ACHIEVED")]
    Achieved,
    #[serde(rename = "IN PROGRESS", alias = "in_progress")]
    InProgress,
    #[default]
    #[serde(rename = "NOT STARTED")]
    #[serde(other)]
    NotStarted,
}

// Goal ids arrive as strings from the backend and as numbers from older payloads.
fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// One of the caller's goals as judged against this conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: GoalStatus,
    #[serde(
        default,
        rename = "currentBehavior",
        alias = "current_behavior",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_behavior: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GoalAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub goal: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alignment_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub areas_for_improvement: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoCategory {
    Diet,
    Exercise,
    Sleep,
    Stress,
    Medication,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTag {
    AiRecommended,
    QuickWin,
    HighImpact,
    DoctorSuggested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoSuggestion {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: TodoCategory,
    #[serde(default)]
    pub health_benefit: String,
    #[serde(default)]
    pub time_of_day: String,
    #[serde(default)]
    pub time_description: String,
    #[serde(default)]
    pub target_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_tag: Option<RecommendationTag>,
}

/// Where one downstream artifact stands. Each artifact moves independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ArtifactState<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> Default for ArtifactState<T> {
    fn default() -> Self {
        ArtifactState::Pending
    }
}

impl<T> ArtifactState<T> {
    pub fn from_result<E: std::fmt::Display>(res: Result<T, E>) -> Self {
        match res {
            Ok(v) => ArtifactState::Ready(v),
            Err(e) => ArtifactState::Failed(format!("{e:#}")),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ArtifactState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ArtifactState::Failed(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ArtifactState::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Everything the results screen renders for one finished call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CallResults {
    pub summary: ArtifactState<ConversationSummary>,
    pub goal_analysis: ArtifactState<GoalAnalysis>,
    pub todos: ArtifactState<Vec<TodoSuggestion>>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl CallResults {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }
}
