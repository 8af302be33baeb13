use serde::Serialize;

use crate::animation::{AnimationSpec, Ease, Property};
use crate::models::{NamedCount, StatisticsRecord, NOT_AVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideId {
    Intro,
    TotalMessages,
    TopChatters,
    TopWords,
    TopEmojis,
    Themes,
    MemorableMoments,
    ChatAura,
    ActiveHours,
    Streak,
    Personalities,
    FunFacts,
    Final,
}

/// Presentation order. Slides are addressed by their position here.
pub const SLIDE_ORDER: [SlideId; 13] = [
    SlideId::Intro,
    SlideId::TotalMessages,
    SlideId::TopChatters,
    SlideId::TopWords,
    SlideId::TopEmojis,
    SlideId::Themes,
    SlideId::MemorableMoments,
    SlideId::ChatAura,
    SlideId::ActiveHours,
    SlideId::Streak,
    SlideId::Personalities,
    SlideId::FunFacts,
    SlideId::Final,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideItem {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SlideItem {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Output of a slide renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSlide {
    pub id: SlideId,
    pub active: bool,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub items: Vec<SlideItem>,
    /// Entrance tweens and looping decorations. Always empty when inactive.
    pub animations: Vec<AnimationSpec>,
}

impl SlideId {
    pub fn render(self, record: &StatisticsRecord, active: bool) -> RenderedSlide {
        let (title, subtitle, items, animations) = match self {
            SlideId::Intro => intro(record),
            SlideId::TotalMessages => total_messages(record),
            SlideId::TopChatters => top_chatters(record),
            SlideId::TopWords => top_words(record),
            SlideId::TopEmojis => top_emojis(record),
            SlideId::Themes => themes(record),
            SlideId::MemorableMoments => memorable_moments(record),
            SlideId::ChatAura => chat_aura(record),
            SlideId::ActiveHours => active_hours(record),
            SlideId::Streak => streak(record),
            SlideId::Personalities => personalities(record),
            SlideId::FunFacts => fun_facts(record),
            SlideId::Final => closing(record),
        };

        RenderedSlide {
            id: self,
            active,
            title: title.to_string(),
            subtitle,
            items,
            animations: if active { animations } else { Vec::new() },
        }
    }
}

/// Ordered list of slides a deck walks through.
#[derive(Debug, Clone)]
pub struct SlideRegistry {
    slides: Vec<SlideId>,
}

impl Default for SlideRegistry {
    fn default() -> Self {
        Self {
            slides: SLIDE_ORDER.to_vec(),
        }
    }
}

impl SlideRegistry {
    /// A custom sequence. `None` for an empty one: a deck always has a slide.
    #[cfg(test)]
    pub fn new(slides: Vec<SlideId>) -> Option<Self> {
        if slides.is_empty() {
            None
        } else {
            Some(Self { slides })
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn get(&self, index: usize) -> Option<SlideId> {
        self.slides.get(index).copied()
    }

    pub fn render(
        &self,
        index: usize,
        record: &StatisticsRecord,
        active: bool,
    ) -> Option<RenderedSlide> {
        self.get(index).map(|id| id.render(record, active))
    }
}

type Rendered = (&'static str, Option<String>, Vec<SlideItem>, Vec<AnimationSpec>);

/// Title fade-down shared by most slides.
fn title_in() -> AnimationSpec {
    AnimationSpec::once("title", Property::Y, -30.0, 0.0, 500, Ease::Power2Out)
}

/// Staggered entrance of the item list.
fn items_in(count: usize) -> Vec<AnimationSpec> {
    (0..count)
        .map(|i| {
            AnimationSpec::once(&format!("item-{i}"), Property::Opacity, 0.0, 1.0, 500, Ease::Power2Out)
                .delayed(300 + 100 * i as u64)
        })
        .collect()
}

fn plural(count: u64, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}

fn intro(record: &StatisticsRecord) -> Rendered {
    let duration = &record.chat_duration;
    let span = if duration.years > 0 {
        plural(duration.years, "año", "años")
    } else if duration.months > 0 {
        plural(duration.months, "mes", "meses")
    } else {
        plural(duration.days, "día", "días")
    };

    let animations = vec![
        AnimationSpec::once("icon", Property::Scale, 0.0, 1.0, 1000, Ease::BackOut).delayed(300),
        AnimationSpec::once("title", Property::Y, 100.0, 0.0, 800, Ease::Power2Out).delayed(500),
        AnimationSpec::looping("icon", Property::Glow, 0.0, 1.0, 2000),
        AnimationSpec::looping("particles", Property::Y, -20.0, 20.0, 3000),
    ];

    (
        "Tu Chat Wrapped",
        Some(format!("{span} de conversaciones resumidos en segundos")),
        Vec::new(),
        animations,
    )
}

fn total_messages(record: &StatisticsRecord) -> Rendered {
    let items = vec![
        SlideItem::new("Mensajes", record.total_messages.to_string()),
        SlideItem::new("Palabras", record.total_words.to_string()),
        SlideItem::new("Caracteres", record.total_characters.to_string()),
        SlideItem::new(
            "Promedio por mensaje",
            format!("{}", record.average_message_length.round() as u64),
        ),
    ];

    let mut animations = vec![
        AnimationSpec::once("counter", Property::Scale, 0.5, 1.0, 2000, Ease::Power2Out),
        AnimationSpec::looping("counter", Property::Glow, 0.0, 1.0, 1500),
    ];
    animations.extend(items_in(items.len()));

    ("Mensajes enviados", None, items, animations)
}

fn top_chatters(record: &StatisticsRecord) -> Rendered {
    let subtitle = record
        .participants
        .first()
        .map(|top| format!("{} con {} mensajes", top.name, top.message_count))
        .or_else(|| Some("Desconocido".to_string()));

    let items: Vec<SlideItem> = record
        .participants
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, p)| {
            SlideItem::new(format!("{}. {}", i + 1, p.name), format!("{}%", p.percentage))
                .with_detail(format!("{} mensajes, {} palabras", p.message_count, p.word_count))
        })
        .collect();

    let mut animations = vec![
        title_in(),
        AnimationSpec::looping("crown", Property::Rotation, -10.0, 10.0, 1000),
    ];
    animations.extend(items_in(items.len()));

    ("El rey del chat es...", subtitle, items, animations)
}

fn top_words(record: &StatisticsRecord) -> Rendered {
    let items: Vec<SlideItem> = record
        .top_words
        .iter()
        .take(15)
        .map(|w| SlideItem::new(&w.word, w.count.to_string()))
        .collect();

    let mut animations = vec![title_in()];
    animations.extend(items_in(items.len()));

    (
        "Su vocabulario favorito",
        Some("Las palabras que más usaron".to_string()),
        items,
        animations,
    )
}

fn top_emojis(record: &StatisticsRecord) -> Rendered {
    let subtitle = match record.top_emojis.first() {
        Some(top) => Some(format!("{} usado {} veces", top.emoji, top.count)),
        None => Some("Sin emojis esta vez".to_string()),
    };

    let items: Vec<SlideItem> = record
        .top_emojis
        .iter()
        .take(8)
        .map(|e| SlideItem::new(&e.emoji, e.count.to_string()))
        .collect();

    let mut animations = vec![
        title_in(),
        AnimationSpec::looping("top-emoji", Property::Scale, 1.0, 1.2, 800),
    ];
    animations.extend(items_in(items.len()));

    ("Emojis favoritos", subtitle, items, animations)
}

fn themes(record: &StatisticsRecord) -> Rendered {
    let items: Vec<SlideItem> = record
        .genero_del_ano
        .iter()
        .take(3)
        .map(|g| SlideItem::new(&g.tema, format!("{}%", g.porcentaje)).with_detail(&g.detalles))
        .collect();

    let mut animations = vec![
        title_in(),
        AnimationSpec::looping("headphones", Property::Rotation, -5.0, 5.0, 2000),
    ];
    animations.extend(items_in(items.len()));

    (
        "De qué hablaron",
        Some("Los temas principales de la conversación".to_string()),
        items,
        animations,
    )
}

fn memorable_moments(record: &StatisticsRecord) -> Rendered {
    let items: Vec<SlideItem> = record
        .momentos_memorables
        .iter()
        .take(3)
        .map(|m| SlideItem::new(&m.titulo, &m.historia))
        .collect();

    let mut animations = vec![title_in()];
    animations.extend(items_in(items.len()));

    ("Momentos Memorables", None, items, animations)
}

fn chat_aura(record: &StatisticsRecord) -> Rendered {
    let items = vec![SlideItem::new(&record.chat_aura.name, &record.chat_aura.description)];

    let animations = vec![
        AnimationSpec::once("orb", Property::Scale, 0.0, 1.0, 1200, Ease::BackOut),
        AnimationSpec::looping("orb", Property::Rotation, 0.0, 360.0, 20_000),
        AnimationSpec::looping("rings", Property::Scale, 1.0, 1.1, 2500),
    ];

    (
        "Tu Aura de Chat",
        Some("La esencia de su conversación".to_string()),
        items,
        animations,
    )
}

fn format_hour(hour: u32) -> String {
    format!("{:02}:00", hour % 24)
}

fn active_hours(record: &StatisticsRecord) -> Rendered {
    let hour = &record.most_active_hour;
    let day = &record.most_active_day;
    let items = vec![
        SlideItem::new("Hora", format_hour(hour.hour))
            .with_detail(format!("{} mensajes a esta hora", hour.count)),
        SlideItem::new("Día", &day.day).with_detail(format!("{} mensajes", day.count)),
    ];

    let mut animations = vec![
        title_in(),
        AnimationSpec::looping("clock-hand", Property::Rotation, 0.0, 360.0, 4000),
    ];
    animations.extend(items_in(items.len()));

    (
        "Horas de máxima actividad",
        Some("Sus conversaciones más activas son...".to_string()),
        items,
        animations,
    )
}

fn streak(record: &StatisticsRecord) -> Rendered {
    let streak = &record.longest_streak;
    let items = vec![SlideItem::new(
        "Racha",
        plural(streak.days, "día", "días"),
    )
    .with_detail(format!("{} - {}", streak.start_date, streak.end_date))];

    let animations = vec![
        AnimationSpec::once("counter", Property::Scale, 0.5, 1.0, 1500, Ease::Power2Out),
        AnimationSpec::looping("flame", Property::Scale, 1.0, 1.15, 600),
    ];

    (
        "Racha más larga",
        Some("de conversación consecutiva".to_string()),
        items,
        animations,
    )
}

fn award(title: &str, slot: &NamedCount, unit: &str) -> SlideItem {
    SlideItem::new(title, &slot.name).with_detail(format!("{} {unit}", slot.count))
}

fn personalities(record: &StatisticsRecord) -> Rendered {
    let mut items = vec![
        award("El Preguntador", &record.question_asker, "preguntas"),
        award("El Risitas", &record.laugh_master, "risas"),
        award("El Noctámbulo", &record.late_night_chatter, "mensajes nocturnos"),
        award("El Madrugador", &record.early_bird, "mensajes tempranos"),
    ];
    if let Some(starter) = record.conversation_starters.first() {
        items.push(award("El Iniciador", starter, "conversaciones iniciadas"));
    }
    items.push(award("El Fan de Notas de Voz", &record.voice_note_fan, "notas de voz"));
    items.push(award("El Rey de los Stickers", &record.media_sharer, "stickers enviados"));

    let mut animations = vec![title_in()];
    animations.extend(items_in(items.len()));

    (
        "Personalidades del chat",
        Some("Cada uno tiene su rol especial".to_string()),
        items,
        animations,
    )
}

fn fun_facts(record: &StatisticsRecord) -> Rendered {
    let items: Vec<SlideItem> = record
        .fun_facts
        .iter()
        .enumerate()
        .map(|(i, fact)| SlideItem::new(format!("{}", i + 1), fact))
        .collect();

    let mut animations = vec![
        title_in(),
        AnimationSpec::looping("sparkles", Property::Opacity, 0.3, 1.0, 1200),
    ];
    animations.extend(items_in(items.len()));

    ("Recuerdos del chat", None, items, animations)
}

fn closing(record: &StatisticsRecord) -> Rendered {
    let mut items = Vec::new();
    if record.frase_final != NOT_AVAILABLE {
        items.push(SlideItem::new("Frase final", format!("“{}”", record.frase_final)));
    }
    if record.artista_top.name != NOT_AVAILABLE {
        items.push(
            SlideItem::new(
                "Tu Artista Top",
                format!("{} {}", record.artista_top.emoji, record.artista_top.name),
            )
            .with_detail(&record.artista_top.description),
        );
    }
    if record.first_message.content != NOT_AVAILABLE {
        items.push(
            SlideItem::new("Primer mensaje", &record.first_message.content).with_detail(format!(
                "{}, {}",
                record.first_message.author, record.first_message.date
            )),
        );
    }

    let animations = vec![
        AnimationSpec::once("confetti", Property::Opacity, 1.0, 0.0, 2000, Ease::Power2Out),
        AnimationSpec::once("heart", Property::Scale, 0.0, 1.0, 800, Ease::BackOut),
        AnimationSpec::looping("heart", Property::Scale, 1.0, 1.1, 800),
    ];

    (
        "Eso es todo por ahora",
        Some(format!(
            "{} mensajes, {} palabras, y un montón de momentos compartidos",
            record.total_messages, record.total_words
        )),
        items,
        animations,
    )
}
