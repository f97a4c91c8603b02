use std::{collections::HashMap, str::FromStr};
use chrono::{DateTime, Utc};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    En,
    Th,
}

impl Default for Lang {
    fn default() -> Self {
        Lang::Th
    }
}

impl FromStr for Lang {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Lang::En),
            "th" => Ok(Lang::Th),
            _ => Err(()),
        }
    }
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Th => "th",
        }
    }

    /// Unknown or missing codes fall back to the default language.
    pub fn parse_or_default(code: Option<&str>) -> Lang {
        code.and_then(|c| c.parse().ok()).unwrap_or_default()
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub en: &'static str,
    pub th: &'static str,
}

impl Label {
    pub fn get(&self, lang: Lang) -> &'static str {
        match lang {
            Lang::En => self.en,
            Lang::Th => self.th,
        }
    }
}


macro_rules! label {
    ($en:expr, $th:expr) => {
        Label { en: $en, th: $th }
    };
}


pub static TRANSLATIONS: &[(&str, Label)] = &[
    ("appName", label!("Dog Help Map", "แผนที่ช่วยหมา")),
    ("reportDog", label!("Report a Dog", "รายงานสุนัข")),
    ("signIn", label!("Sign in with Google", "เข้าสู่ระบบด้วย Google")),
    ("signOut", label!("Sign Out", "ออกจากระบบ")),
    ("myReports", label!("My Reports", "รายงานของฉัน")),
    ("status", label!("Status", "สถานะ")),
    ("description", label!("Description", "รายละเอียด")),
    ("photo", label!("Photo", "รูปภาพ")),
    ("dogCount", label!("Number of Dogs", "จำนวนสุนัข")),
    ("submit", label!("Submit", "ส่ง")),
    ("cancel", label!("Cancel", "ยกเลิก")),
    ("close", label!("Close", "ปิด")),
    ("filter", label!("Filter", "กรอง")),
    ("all", label!("All", "ทั้งหมด")),
    ("heatmap", label!("Heatmap", "แผนที่ความหนาแน่น")),
    ("pins", label!("Pins", "ปักหมุด")),
    ("locateMe", label!("Locate Me", "ตำแหน่งของฉัน")),
    ("tapToPlace", label!("Tap map to place pin", "แตะแผนที่เพื่อปักหมุด")),
    ("useMyLocation", label!("Use My Location", "ใช้ตำแหน่งของฉัน")),
    ("reportedBy", label!("Reported by", "รายงานโดย")),
    ("updateStatus", label!("Update Status", "อัปเดตสถานะ")),
    ("statusHistory", label!("Status History", "ประวัติสถานะ")),
    ("dogs", label!("dogs", "ตัว")),
    ("ago", label!("ago", "ที่แล้ว")),
    ("justNow", label!("Just now", "เมื่อสักครู่")),
    ("minutesAgo", label!("min ago", "นาทีที่แล้ว")),
    ("hoursAgo", label!("hr ago", "ชั่วโมงที่แล้ว")),
    ("daysAgo", label!("days ago", "วันที่แล้ว")),
    ("loginToReport", label!("Sign in to report a dog", "เข้าสู่ระบบเพื่อรายงานสุนัข")),
    ("selectLocation", label!("Please select a location on the map", "กรุณาเลือกตำแหน่งบนแผนที่")),
    ("optional", label!("optional", "ไม่บังคับ")),
    ("uploading", label!("Uploading...", "กำลังอัปโหลด...")),
    ("submitting", label!("Submitting...", "กำลังส่ง...")),
    ("note", label!("Note", "หมายเหตุ")),
    ("zone", label!("Zone", "โซน")),
    ("searchZone", label!("Search zone...", "ค้นหาโซน...")),
    ("showAll", label!("Show All", "แสดงทั้งหมด")),
    ("noZones", label!("No zones found", "ไม่พบโซน")),
    ("popular", label!("Popular", "ยอดนิยม")),
    ("allAreas", label!("All Areas", "ทั้งหมด")),
    ("searchLocation", label!("Search location...", "ค้นหาสถานที่...")),
    ("adminPanel", label!("Admin Panel", "แผงควบคุม")),
    ("adminDashboard", label!("Dashboard", "แดชบอร์ด")),
    ("backToMap", label!("Back to Map", "กลับไปแผนที่")),
    ("totalReports", label!("Total Reports", "รายงานทั้งหมด")),
    ("totalUsers", label!("Total Users", "ผู้ใช้ทั้งหมด")),
    ("statusUpdates", label!("Status Updates", "อัปเดตสถานะ")),
    ("reportsToday", label!("Reports Today", "รายงานวันนี้")),
    ("reportsLast7Days", label!("Reports (Last 7 Days)", "รายงาน (7 วันล่าสุด)")),
    ("signupsLast7Days", label!("Signups (Last 7 Days)", "สมัคร (7 วันล่าสุด)")),
    ("allReports", label!("All Reports", "รายงานทั้งหมด")),
    ("location", label!("Location", "ตำแหน่ง")),
    ("date", label!("Date", "วันที่")),
    ("actions", label!("Actions", "การกระทำ")),
    ("deleteReport", label!("Delete", "ลบ")),
    ("confirmDelete", label!("Are you sure you want to delete this report?",
        "คุณแน่ใจหรือไม่ว่าต้องการลบรายงานนี้?")),
    ("viewOnMap", label!("View on Map", "ดูบนแผนที่")),
    ("noReports", label!("No reports yet", "ยังไม่มีรายงาน")),
    ("unauthorized", label!("Unauthorized", "ไม่ได้รับอนุญาต")),
];


lazy_static! {
    static ref TRANSLATION_INDEX: HashMap<&'static str, Label> = {
        TRANSLATIONS.iter().cloned().collect()
    };
}


pub fn translate(key: &str, lang: Lang) -> Option<&'static str> {
    TRANSLATION_INDEX.get(key).map(|label| label.get(lang))
}

fn text(key: &str, lang: Lang) -> &'static str {
    translate(key, lang).unwrap_or("")
}


/// Relative age of `then` as seen at `now`, e.g. "5 min ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>, lang: Lang) -> String {
    let mins = (now - then).num_minutes();
    if mins < 1 {
        return text("justNow", lang).to_owned();
    }
    if mins < 60 {
        return format!("{} {}", mins, text("minutesAgo", lang));
    }

    let hrs = mins / 60;
    if hrs < 24 {
        return format!("{} {}", hrs, text("hoursAgo", lang));
    }

    format!("{} {}", hrs / 24, text("daysAgo", lang))
}
