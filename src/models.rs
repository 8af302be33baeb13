use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel used for every free-text field the model left out
pub const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Last hour of the day; `mostActiveHour.hour` is clamped to it
pub const LAST_HOUR: u32 = 23;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

/// Any JSON number as a count: integral floats such as `1250.0` are kept,
/// fractions are rounded, negatives clamp to 0. Non-numbers are an error.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawCount::deserialize(deserializer)? {
        RawCount::Unsigned(n) => n,
        RawCount::Signed(_) => 0,
        RawCount::Float(f) if f.is_finite() && f > 0.0 => f.round() as u64,
        RawCount::Float(_) => 0,
    })
}

fn hour<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    count(deserializer).map(|n| n.min(u64::from(LAST_HOUR)) as u32)
}

/// Analyze request from the upload screen
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeInput {
    pub chat_content: Option<String>,
}

/// Error body for every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Normalized result of one analysis run.
///
/// Every field is always populated: `normalize::with_defaults` is the only
/// constructor used on model output, and it enumerates a default for each
/// field. Renderers may assume presence and only guard empty sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsRecord {
    #[serde(deserialize_with = "count")]
    pub total_messages: u64,
    #[serde(deserialize_with = "count")]
    pub total_words: u64,
    #[serde(deserialize_with = "count")]
    pub total_characters: u64,
    pub average_message_length: f64,
    pub participants: Vec<Participant>,
    pub top_words: Vec<WordCount>,
    pub top_emojis: Vec<EmojiCount>,
    pub conversation_themes: Vec<ConversationTheme>,
    pub most_active_hour: HourSlot,
    pub most_active_day: DaySlot,
    pub longest_streak: Streak,
    pub conversation_starters: Vec<NamedCount>,
    pub late_night_chatter: NamedCount,
    pub early_bird: NamedCount,
    pub question_asker: NamedCount,
    pub laugh_master: NamedCount,
    pub voice_note_fan: NamedCount,
    pub media_sharer: NamedCount,
    pub first_message: FirstMessage,
    pub chat_duration: ChatDuration,
    pub chat_aura: ChatAura,
    pub fun_facts: Vec<String>,
    pub artista_top: ArtistaTop,
    pub genero_del_ano: Vec<GeneroDelAno>,
    pub cancion_repeat: Vec<CancionRepeat>,
    pub momentos_memorables: Vec<MomentoMemorable>,
    pub frase_final: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default = "not_available")]
    pub name: String,
    #[serde(default, deserialize_with = "count")]
    pub message_count: u64,
    #[serde(default, deserialize_with = "count")]
    pub word_count: u64,
    /// Share of total messages as reported by the model, not recomputed
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCount {
    #[serde(default = "not_available")]
    pub word: String,
    #[serde(default, deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiCount {
    #[serde(default = "not_available")]
    pub emoji: String,
    #[serde(default, deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTheme {
    #[serde(default = "not_available")]
    pub theme: String,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default = "not_available")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneroDelAno {
    #[serde(default = "not_available")]
    pub tema: String,
    #[serde(default)]
    pub porcentaje: f64,
    #[serde(default = "not_available")]
    pub detalles: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancionRepeat {
    #[serde(default = "not_available")]
    pub palabra: String,
    #[serde(default = "not_available")]
    pub significado: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentoMemorable {
    #[serde(default = "not_available")]
    pub titulo: String,
    #[serde(default = "not_available")]
    pub historia: String,
}

/// Superlative slot: who did something the most, and how often
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedCount {
    pub name: String,
    #[serde(deserialize_with = "count")]
    pub count: u64,
}

impl Default for NamedCount {
    fn default() -> Self {
        Self {
            name: not_available(),
            count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourSlot {
    #[serde(deserialize_with = "hour")]
    pub hour: u32,
    #[serde(deserialize_with = "count")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaySlot {
    pub day: String,
    #[serde(deserialize_with = "count")]
    pub count: u64,
}

impl Default for DaySlot {
    fn default() -> Self {
        Self {
            day: not_available(),
            count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Streak {
    #[serde(deserialize_with = "count")]
    pub days: u64,
    pub start_date: String,
    pub end_date: String,
}

impl Default for Streak {
    fn default() -> Self {
        Self {
            days: 0,
            start_date: not_available(),
            end_date: not_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirstMessage {
    pub date: String,
    pub author: String,
    pub content: String,
}

impl Default for FirstMessage {
    fn default() -> Self {
        Self {
            date: not_available(),
            author: not_available(),
            content: not_available(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatDuration {
    #[serde(deserialize_with = "count")]
    pub days: u64,
    #[serde(deserialize_with = "count")]
    pub months: u64,
    #[serde(deserialize_with = "count")]
    pub years: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatAura {
    pub name: String,
    pub description: String,
}

impl Default for ChatAura {
    fn default() -> Self {
        Self {
            name: not_available(),
            description: not_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistaTop {
    pub name: String,
    pub description: String,
    pub emoji: String,
}

impl Default for ArtistaTop {
    fn default() -> Self {
        Self {
            name: not_available(),
            description: not_available(),
            emoji: not_available(),
        }
    }
}
