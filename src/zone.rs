use std::collections::BTreeSet;
use serde_json::{json, Value as JsonValue};

use crate::geo::LatLng;
use crate::lang::{Label, Lang};
use crate::model::Report;
use crate::status::DogStatus;


/// A named circular region used to group reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: &'static str,
    pub name: Label,
    pub icon: &'static str,
    pub center: LatLng,
    /// Meters, always positive.
    pub radius: f64,
    pub popular: bool,
}

impl Zone {
    pub fn distance_to(&self, lat: f64, lng: f64) -> f64 {
        self.center.distance_to(lat, lng)
    }

    /// Membership used for filtering and counting. The boundary is inside.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        self.distance_to(lat, lng) <= self.radius
    }

    pub fn contains_report(&self, report: &Report) -> bool {
        self.contains(report.latitude, report.longitude)
    }

    pub fn to_json(&self, lang: Lang) -> JsonValue {
        json!({
            "id": self.id,
            "name": self.name.get(lang),
            "name_en": self.name.en,
            "name_th": self.name.th,
            "icon": self.icon,
            "latitude": self.center.lat,
            "longitude": self.center.lng,
            "radius": self.radius,
            "popular": self.popular,
        })
    }
}


macro_rules! zone {
    ($id:expr, $en:expr, $th:expr, $icon:expr, $lat:expr, $lng:expr, $radius:expr, $popular:expr) => {
        Zone {
            id: $id,
            name: Label { en: $en, th: $th },
            icon: $icon,
            center: LatLng { lat: $lat, lng: $lng },
            radius: $radius,
            popular: $popular,
        }
    };
}


pub static BANGKOK_ZONES: [Zone; 16] = [
    zone!("sukhumvit", "Sukhumvit", "สุขุมวิท", "🏙️", 13.7315, 100.5685, 3000.0, true),
    zone!("silom", "Silom / Sathorn", "สีลม / สาทร", "🏢", 13.7262, 100.5235, 2500.0, true),
    zone!("siam", "Siam / Ratchaprasong", "สยาม / ราชประสงค์", "🛍️", 13.7462, 100.5347, 2000.0, true),
    zone!("chatuchak", "Chatuchak / Lat Phrao", "จตุจักร / ลาดพร้าว", "🌳", 13.7999, 100.5533, 3000.0, true),
    zone!("bangkapi", "Bang Kapi / Ramkhamhaeng", "บางกะปิ / รามคำแหง", "🎓", 13.7647, 100.6447, 3000.0, true),
    zone!("thonburi", "Thonburi / Pinklao", "ธนบุรี / ปิ่นเกล้า", "🌊", 13.7614, 100.4761, 3000.0, true),
    zone!("yaowarat", "Yaowarat / Chinatown", "เยาวราช", "🏮", 13.7407, 100.5096, 2000.0, false),
    zone!("rattanakosin", "Rattanakosin / Old Town", "รัตนโกสินทร์", "🏛️", 13.7516, 100.4929, 2500.0, false),
    zone!("dindaeng", "Din Daeng / Huai Khwang", "ดินแดง / ห้วยขวาง", "🏬", 13.7704, 100.5587, 2500.0, false),
    zone!("bangna", "Bang Na / Bearing", "บางนา / แบริ่ง", "🛣️", 13.6685, 100.6048, 3000.0, false),
    zone!("minburi", "Min Buri / Nong Chok", "มีนบุรี / หนองจอก", "🌾", 13.8107, 100.7295, 4000.0, false),
    zone!("bangkhen", "Bang Khen / Don Mueang", "บางเขน / ดอนเมือง", "✈️", 13.8929, 100.5883, 4000.0, false),
    zone!("taling-chan", "Taling Chan / Bang Khae", "ตลิ่งชัน / บางแค", "🌿", 13.7737, 100.4327, 3500.0, false),
    zone!("prawet", "Prawet / Suan Luang", "ประเวศ / สวนหลวง", "🌲", 13.7198, 100.6621, 3500.0, false),
    zone!("latkrabang", "Lat Krabang", "ลาดกระบัง", "🏭", 13.7280, 100.7475, 4000.0, false),
    zone!("ramindra", "Ram Inthra / Khan Na Yao", "รามอินทรา / คันนายาว", "🛤️", 13.8368, 100.6707, 3500.0, false),
];


pub fn registry() -> &'static [Zone] {
    &BANGKOK_ZONES
}

pub fn find_zone(id: &str) -> Option<&'static Zone> {
    registry().iter().find(|z| z.id == id)
}


pub fn find_nearest_zone(lat: f64, lng: f64) -> Option<&'static Zone> {
    find_nearest_zone_in(registry(), lat, lng)
}

/// Among zones whose radius strictly exceeds their center distance to the
/// point, the one with the closest center. Equal distances keep the earlier
/// zone.
pub fn find_nearest_zone_in(zones: &[Zone], lat: f64, lng: f64) -> Option<&Zone> {
    let mut nearest = None;
    let mut min_dist = f64::INFINITY;

    for zone in zones {
        let d = zone.distance_to(lat, lng);
        if d < zone.radius && d < min_dist {
            min_dist = d;
            nearest = Some(zone);
        }
    }

    nearest
}


/// Reports inside `zone`, or all of them when no zone is selected.
pub fn filter_by_zone<'a>(reports: &'a [Report], zone: Option<&Zone>) -> Vec<&'a Report> {
    match zone {
        Some(zone) => reports.iter().filter(|r| zone.contains_report(r)).collect(),
        None => reports.iter().collect(),
    }
}

/// An empty selection lets every status through.
pub fn filter_by_status<'a, I>(reports: I, statuses: &BTreeSet<DogStatus>) -> Vec<&'a Report> where
    I: IntoIterator<Item = &'a Report> {

    reports.into_iter()
        .filter(|r| statuses.is_empty() || statuses.contains(&r.status))
        .collect()
}

/// Report count for every zone in `zones`, in registry order, regardless of
/// any current selection.
pub fn zone_report_counts<'z>(reports: &[Report], zones: &'z [Zone]) -> Vec<(&'z Zone, usize)> {
    zones.iter()
        .map(|zone| (zone, reports.iter().filter(|r| zone.contains_report(r)).count()))
        .collect()
}


pub fn popular_zones() -> Vec<&'static Zone> {
    registry().iter().filter(|z| z.popular).collect()
}

pub fn other_zones() -> Vec<&'static Zone> {
    registry().iter().filter(|z| !z.popular).collect()
}

/// Case-insensitive match on the English name, substring match on the Thai
/// name. A blank query matches everything.
pub fn search_zones(query: &str) -> Vec<&'static Zone> {
    let query = query.trim();
    let lowered = query.to_lowercase();

    registry().iter()
        .filter(|z| query.is_empty()
            || z.name.en.to_lowercase().contains(&lowered)
            || z.name.th.contains(query))
        .collect()
}
