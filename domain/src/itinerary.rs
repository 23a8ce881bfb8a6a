use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Structured multi-day trip plan produced by the remote service.
///
/// Field names follow the wire format. Unknown fields are kept in `extra`
/// so a stored itinerary reads back exactly as it was received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(
        rename = "titulo",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(
        rename = "destino",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub destination: Option<String>,
    #[serde(
        rename = "resumen",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<String>,
    #[serde(
        rename = "mensaje_chat",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub chat_message: Option<String>,
    #[serde(rename = "dias", default, deserialize_with = "lenient_days")]
    pub days: Vec<Day>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Itinerary {
    /// Title used for the owning conversation.
    pub fn conversation_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!(
                "Viaje a {}",
                self.destination.as_deref().unwrap_or("España")
            ),
        }
    }

    /// Name shown above the day list and in exported documents.
    pub fn destination_label(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.destination.clone())
            .unwrap_or_else(|| "Trip".to_string())
    }

    pub fn day_views(&self) -> Vec<DayView> {
        self.days
            .iter()
            .enumerate()
            .map(|(index, day)| day.view(index))
            .collect()
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(text_of(&raw))
}

fn lenient_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Day>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Array(items) => items.into_iter().map(Day).collect(),
        _ => Vec::new(),
    })
}

/// Non-empty text of a JSON scalar; `null`, `""` and `false` read as absent.
fn text_of(raw: &Value) -> Option<String> {
    match raw {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn field_text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(text_of))
}

/// Activity category drawn from a fixed open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Culture,
    Food,
    Hiking,
    Relaxation,
    Sightseeing,
    General,
}

impl Category {
    /// Map a free-form category string onto the fixed set by substring.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Category::General;
        };
        let s = raw.to_lowercase();
        if s.contains("cultur") {
            Category::Culture
        } else if s.contains("gastr") || s.contains("food") || s.contains("tapa") {
            Category::Food
        } else if s.contains("hike") || s.contains("trek") || s.contains("sender") {
            Category::Hiking
        } else if s.contains("relax") {
            Category::Relaxation
        } else if s.contains("sight") || s.contains("tour") || s.contains("view") {
            Category::Sightseeing
        } else {
            Category::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Culture => "Culture",
            Category::Food => "Food",
            Category::Hiking => "Hiking",
            Category::Relaxation => "Relaxation",
            Category::Sightseeing => "Sightseeing",
            Category::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day of an itinerary, kept as the raw record the service sent.
///
/// Three shapes are in circulation:
/// - `{dia, titulo_dia, resumen, itinerario: [{hora, momento, activity, category, detalles}], tip_pro}`
/// - `{dia, resumen, actividades: [..]}`
/// - `{dia, morning, lunch, afternoon}`
///
/// [`Day::view`] folds all of them into a [`DayView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(pub Value);

#[derive(Debug, Clone, PartialEq)]
pub struct DayView {
    pub number: u64,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub entries: Vec<ActivityView>,
    pub tip: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityView {
    pub label: String,
    pub time: Option<String>,
    pub moment: Option<String>,
    pub text: String,
    pub details: Option<String>,
    pub category: Category,
}

const LEGACY_SLOTS: [(&str, &str); 3] = [
    ("morning", "Mañana"),
    ("lunch", "Almuerzo"),
    ("afternoon", "Tarde"),
];

impl Day {
    /// Rendering model for the day at `index` (zero-based position in the list).
    pub fn view(&self, index: usize) -> DayView {
        let raw = &self.0;
        let number = ["day", "dia"]
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_u64).filter(|n| *n > 0))
            .unwrap_or(index as u64 + 1);

        let timed = raw.get("itinerario").and_then(Value::as_array);
        let untimed = raw
            .get("actividades")
            .or_else(|| raw.get("activities"))
            .and_then(Value::as_array);

        let entries = if let Some(items) = timed {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let moment = field_text(item, &["momento"]);
                    ActivityView {
                        label: moment
                            .clone()
                            .unwrap_or_else(|| format!("Actividad {}", i + 1)),
                        time: field_text(item, &["hora"]),
                        moment,
                        text: activity_text(item),
                        details: field_text(item, &["detalles"]),
                        category: item_category(item),
                    }
                })
                .collect()
        } else if let Some(items) = untimed {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| ActivityView {
                    label: format!("Actividad {}", i + 1),
                    time: None,
                    moment: None,
                    text: activity_text(item),
                    details: None,
                    category: item_category(item),
                })
                .collect()
        } else {
            LEGACY_SLOTS
                .iter()
                .filter_map(|(key, label)| {
                    let slot = raw.get(*key).filter(|v| text_of(v).is_some())?;
                    Some(ActivityView {
                        label: label.to_string(),
                        time: None,
                        moment: None,
                        text: match slot {
                            Value::String(s) => s.clone(),
                            _ => field_text(slot, &["activity"]).unwrap_or_default(),
                        },
                        details: None,
                        category: Category::normalize(
                            field_text(slot, &["category"]).as_deref(),
                        ),
                    })
                })
                .collect()
        };

        DayView {
            number,
            title: field_text(raw, &["titulo_dia", "title"]),
            summary: field_text(raw, &["resumen", "summary"]),
            entries,
            tip: field_text(raw, &["tip_pro"]),
        }
    }
}

fn activity_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => field_text(other, &["activity", "nombre", "name"]).unwrap_or_else(|| other.to_string()),
    }
}

fn item_category(item: &Value) -> Category {
    Category::normalize(field_text(item, &["category", "categoria", "type"]).as_deref())
}
