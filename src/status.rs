use std::{fmt, str::FromStr};
use serde_json::{json, Value as JsonValue};

use crate::lang::{Label, Lang};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DogStatus {
    Spotted,
    Hungry,
    Fed,
    Hurt,
    Urgent,
    Sick,
    Friendly,
    Aggressive,
    Bathed,
    Rescued,
}

pub struct StatusStyle {
    pub label: Label,
    pub color: &'static str,
    pub bg_color: &'static str,
    pub icon: &'static str,
}


// Indexed by `DogStatus as usize`.
static STATUS_STYLES: [StatusStyle; 10] = [
    StatusStyle { label: Label { en: "Spotted", th: "พบเห็น" }, color: "#6b7280", bg_color: "#f3f4f6", icon: "👀" },
    StatusStyle { label: Label { en: "Hungry", th: "หิว" }, color: "#f97316", bg_color: "#fff7ed", icon: "🍽️" },
    StatusStyle { label: Label { en: "Fed", th: "ได้กินแล้ว" }, color: "#22c55e", bg_color: "#f0fdf4", icon: "✅" },
    StatusStyle { label: Label { en: "Hurt", th: "บาดเจ็บ" }, color: "#ef4444", bg_color: "#fef2f2", icon: "🩹" },
    StatusStyle { label: Label { en: "Urgent", th: "เร่งด่วน" }, color: "#dc2626", bg_color: "#fef2f2", icon: "🚨" },
    StatusStyle { label: Label { en: "Sick", th: "ป่วย" }, color: "#a855f7", bg_color: "#faf5ff", icon: "🤒" },
    StatusStyle { label: Label { en: "Friendly", th: "เป็นมิตร" }, color: "#3b82f6", bg_color: "#eff6ff", icon: "💙" },
    StatusStyle { label: Label { en: "Aggressive", th: "ดุ" }, color: "#ea580c", bg_color: "#fff7ed", icon: "⚠️" },
    StatusStyle { label: Label { en: "Bathed", th: "อาบน้ำแล้ว" }, color: "#14b8a6", bg_color: "#f0fdfa", icon: "🚿" },
    StatusStyle { label: Label { en: "Rescued", th: "ถูกช่วยแล้ว" }, color: "#eab308", bg_color: "#fefce8", icon: "🏠" },
];


impl DogStatus {
    pub const ALL: [DogStatus; 10] = [
        DogStatus::Spotted,
        DogStatus::Hungry,
        DogStatus::Fed,
        DogStatus::Hurt,
        DogStatus::Urgent,
        DogStatus::Sick,
        DogStatus::Friendly,
        DogStatus::Aggressive,
        DogStatus::Bathed,
        DogStatus::Rescued,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DogStatus::Spotted => "spotted",
            DogStatus::Hungry => "hungry",
            DogStatus::Fed => "fed",
            DogStatus::Hurt => "hurt",
            DogStatus::Urgent => "urgent",
            DogStatus::Sick => "sick",
            DogStatus::Friendly => "friendly",
            DogStatus::Aggressive => "aggressive",
            DogStatus::Bathed => "bathed",
            DogStatus::Rescued => "rescued",
        }
    }

    pub fn style(self) -> &'static StatusStyle {
        &STATUS_STYLES[self as usize]
    }

    pub fn to_json(self, lang: Lang) -> JsonValue {
        let style = self.style();
        json!({
            "status": self.as_str(),
            "label": style.label.get(lang),
            "color": style.color,
            "bg_color": style.bg_color,
            "icon": style.icon,
        })
    }
}

impl fmt::Display for DogStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Unknown status: {}", self.0)
    }
}

impl FromStr for DogStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DogStatus::ALL.iter()
            .find(|status| status.as_str() == s)
            .cloned()
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}
