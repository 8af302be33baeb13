use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::models::*;

/// Opening code fence, optionally tagged `json`.
static FENCE_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").unwrap());

static FENCE_CLOSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```$").unwrap());

static LINE_BREAK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]+").unwrap());

/// Normalize raw model text into a fully populated record. Never fails.
///
/// A field with a missing or unexpected shape takes its default; text that
/// is not a JSON object at all is replaced wholesale by `fallback_record`.
pub fn normalize(raw: &str) -> StatisticsRecord {
    match parse_object(raw) {
        Some(partial) => with_defaults(&partial),
        None => {
            warn!(len = raw.len(), "model response is not a JSON object, using fallback record");
            debug!(raw, "unparseable model response");
            fallback_record()
        }
    }
}

/// Strip a surrounding code fence and collapse line breaks to single spaces.
pub fn clean(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if text.starts_with("```") {
        text = FENCE_OPEN_REGEX.replace(&text, "").into_owned();
        text = FENCE_CLOSE_REGEX.replace(&text, "").into_owned();
    }
    LINE_BREAK_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Parse the cleaned text as a JSON object.
///
/// Falls back to the span between the first `{` and the last `}` when the
/// model wrapped the object in prose.
fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let text = clean(raw);

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => return Some(map),
        Ok(other) => {
            debug!(kind = value_kind(&other), "top-level value is not an object");
            return None;
        }
        Err(err) => debug!(%err, "strict parse failed, retrying on the outermost braces"),
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Copy `key` out of `partial` if it has the expected shape, otherwise `default`.
fn field<T, F>(partial: &Map<String, Value>, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(value) = partial.get(key) else {
        return default();
    };
    match T::deserialize(value) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(field = key, %err, "field has unexpected shape, using default");
            default()
        }
    }
}

/// Count at `key`, accepting any JSON number; anything else is 0.
fn count_field(partial: &Map<String, Value>, key: &str) -> u64 {
    let Some(value) = partial.get(key) else {
        return 0;
    };
    count(value).unwrap_or_else(|err| {
        debug!(field = key, %err, "count has unexpected shape, using 0");
        0
    })
}

/// Sequence at `key`, keeping every element that has the expected shape.
/// One malformed entry is dropped without losing its neighbours.
fn list_field<T>(partial: &Map<String, Value>, key: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    match partial.get(key) {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match T::deserialize(item) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!(field = key, index, %err, "dropping malformed entry");
                    None
                }
            })
            .collect(),
        Some(other) => {
            debug!(field = key, kind = value_kind(other), "expected a list, using empty");
            Vec::new()
        }
    }
}

/// Total function from a partial JSON object to a complete record.
pub fn with_defaults(partial: &Map<String, Value>) -> StatisticsRecord {
    StatisticsRecord {
        total_messages: count_field(partial, "totalMessages"),
        total_words: count_field(partial, "totalWords"),
        total_characters: count_field(partial, "totalCharacters"),
        average_message_length: field(partial, "averageMessageLength", || 0.0_f64).max(0.0),
        participants: list_field(partial, "participants"),
        top_words: list_field(partial, "topWords"),
        top_emojis: list_field(partial, "topEmojis"),
        conversation_themes: list_field(partial, "conversationThemes"),
        most_active_hour: field(partial, "mostActiveHour", HourSlot::default),
        most_active_day: field(partial, "mostActiveDay", DaySlot::default),
        longest_streak: field(partial, "longestStreak", Streak::default),
        conversation_starters: list_field(partial, "conversationStarters"),
        late_night_chatter: field(partial, "lateNightChatter", NamedCount::default),
        early_bird: field(partial, "earlyBird", NamedCount::default),
        question_asker: field(partial, "questionAsker", NamedCount::default),
        laugh_master: field(partial, "laughMaster", NamedCount::default),
        voice_note_fan: field(partial, "voiceNoteFan", NamedCount::default),
        media_sharer: field(partial, "mediaSharer", NamedCount::default),
        first_message: field(partial, "firstMessage", FirstMessage::default),
        chat_duration: field(partial, "chatDuration", ChatDuration::default),
        chat_aura: field(partial, "chatAura", ChatAura::default),
        fun_facts: list_field(partial, "funFacts"),
        artista_top: field(partial, "artistaTop", ArtistaTop::default),
        genero_del_ano: list_field(partial, "generoDelAno"),
        cancion_repeat: list_field(partial, "cancionRepeat"),
        momentos_memorables: list_field(partial, "momentosMemorables"),
        frase_final: field(partial, "fraseFinal", || NOT_AVAILABLE.to_string()),
    }
}

/// Same as `with_defaults`, for callers holding an arbitrary JSON value.
/// Anything other than an object yields the all-defaults record.
pub fn record_from_value(value: &Value) -> StatisticsRecord {
    match value {
        Value::Object(map) => with_defaults(map),
        _ => with_defaults(&Map::new()),
    }
}

fn named(name: &str, count: u64) -> NamedCount {
    NamedCount {
        name: name.to_string(),
        count,
    }
}

/// Complete example record served when the model output cannot be parsed.
pub fn fallback_record() -> StatisticsRecord {
    StatisticsRecord {
        total_messages: 1250,
        total_words: 18500,
        total_characters: 95000,
        average_message_length: 15.2,
        participants: vec![
            Participant {
                name: "Usuario".to_string(),
                message_count: 625,
                word_count: 9250,
                percentage: 50.0,
            },
            Participant {
                name: "Amigo".to_string(),
                message_count: 625,
                word_count: 9250,
                percentage: 50.0,
            },
        ],
        top_words: [("hola", 120), ("gracias", 95), ("bueno", 80), ("perfecto", 65), ("mañana", 50)]
            .into_iter()
            .map(|(word, count)| WordCount {
                word: word.to_string(),
                count,
            })
            .collect(),
        top_emojis: [("😂", 85), ("❤️", 60), ("👍", 42), ("🙌", 30), ("😅", 22)]
            .into_iter()
            .map(|(emoji, count)| EmojiCount {
                emoji: emoji.to_string(),
                count,
            })
            .collect(),
        conversation_themes: vec![
            ConversationTheme {
                theme: "Conversaciones Generales".to_string(),
                percentage: 60.0,
                description: "Charlas cotidianas sobre el día a día".to_string(),
            },
            ConversationTheme {
                theme: "Entretenimiento".to_string(),
                percentage: 40.0,
                description: "Conversaciones sobre series, películas y hobbies".to_string(),
            },
        ],
        most_active_hour: HourSlot { hour: 20, count: 180 },
        most_active_day: DaySlot {
            day: "Viernes".to_string(),
            count: 250,
        },
        longest_streak: Streak {
            days: 15,
            start_date: "2023-10-01".to_string(),
            end_date: "2023-10-15".to_string(),
        },
        conversation_starters: vec![named("Usuario", 55), named("Amigo", 50)],
        late_night_chatter: named("Usuario", 35),
        early_bird: named("Amigo", 25),
        question_asker: named("Amigo", 95),
        laugh_master: named("Usuario", 140),
        voice_note_fan: named("Usuario", 45),
        media_sharer: named("Amigo", 35),
        first_message: FirstMessage {
            date: "2023-01-15T10:30:00Z".to_string(),
            author: "Usuario".to_string(),
            content: "¡Hola! ¿Cómo estás?".to_string(),
        },
        chat_duration: ChatDuration {
            days: 365,
            months: 12,
            years: 1,
        },
        chat_aura: ChatAura {
            name: "Conversacional".to_string(),
            description: "Un chat amigable y cotidiano lleno de conversaciones interesantes."
                .to_string(),
        },
        fun_facts: [
            "Han mantenido conversaciones durante todo un año",
            "El viernes es el día más activo",
            "Comparten muchos momentos de risa",
            "Han enviado cientos de mensajes",
            "Sus conversaciones son variadas e interesantes",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        artista_top: ArtistaTop {
            name: "Usuario".to_string(),
            description: "Quien más mensajes manda y quien siempre responde primero".to_string(),
            emoji: "🎤".to_string(),
        },
        genero_del_ano: vec![
            GeneroDelAno {
                tema: "1. Conversaciones Generales".to_string(),
                porcentaje: 60.0,
                detalles: "Charlas cotidianas sobre el día a día".to_string(),
            },
            GeneroDelAno {
                tema: "2. Entretenimiento".to_string(),
                porcentaje: 40.0,
                detalles: "Series, películas y hobbies compartidos".to_string(),
            },
        ],
        cancion_repeat: vec![
            CancionRepeat {
                palabra: "hola".to_string(),
                significado: "El saludo que abre casi todas las conversaciones".to_string(),
            },
            CancionRepeat {
                palabra: "gracias".to_string(),
                significado: "Buenos modales en cada intercambio".to_string(),
            },
        ],
        momentos_memorables: vec![
            MomentoMemorable {
                titulo: "El primer mensaje".to_string(),
                historia: "Un simple saludo que empezó un año entero de conversaciones".to_string(),
            },
            MomentoMemorable {
                titulo: "La racha de octubre".to_string(),
                historia: "Quince días seguidos sin dejar de escribirse".to_string(),
            },
        ],
        frase_final: "¡Hola! ¿Cómo estás?".to_string(),
    }
}

/// Whether `value` deserializes as `T`; used by tests to assert shapes.
#[cfg(test)]
fn has_shape<T: DeserializeOwned>(value: &Value) -> bool {
    T::deserialize(value).is_ok()
}
