use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::practitioner::{Bio, PractitionerRecord};
use super::site_config::SiteConfig;
use super::work::WorkRecord;
use super::{now_millis, ModelError};

/// The complete synchronizable value: every practitioner plus the site
/// configuration.
///
/// Each mutation consumes the value and returns the next revision with a
/// fresh `last_updated`; nothing is edited in place behind a shared
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveState {
    #[serde(default)]
    pub practitioners: Vec<PractitionerRecord>,
    #[serde(default)]
    pub site_config: SiteConfig,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl ArchiveState {
    pub fn new(practitioners: Vec<PractitionerRecord>, site_config: SiteConfig) -> Self {
        Self {
            practitioners,
            site_config,
            last_updated: now_millis(),
        }
    }

    /// The archive a fresh install starts from.
    pub fn seed() -> Self {
        Self::new(vec![seed_practitioner()], SiteConfig::default())
    }

    pub fn practitioner(&self, id: &str) -> Option<&PractitionerRecord> {
        self.practitioners.iter().find(|p| p.id == id)
    }

    /// Looks a practitioner up by id, falling back to a case-insensitive
    /// name match.
    pub fn find(&self, identifier: &str) -> Option<&PractitionerRecord> {
        self.practitioner(identifier).or_else(|| {
            let wanted = identifier.trim().to_lowercase();
            self.practitioners
                .iter()
                .find(|p| p.name.to_lowercase() == wanted)
        })
    }

    /// Practitioners matching `query`; everything when the query is blank.
    pub fn search(&self, query: &str) -> Vec<&PractitionerRecord> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.practitioners.iter().collect();
        }
        self.practitioners
            .iter()
            .filter(|p| p.matches(&query))
            .collect()
    }

    /// Saves a practitioner: stamps `updated_at`, replaces an existing record
    /// with the same id in place, or inserts a new one at the front.
    pub fn with_practitioner(mut self, mut record: PractitionerRecord) -> Self {
        let now = now_millis();
        record.updated_at = Some(now);
        match self.practitioners.iter().position(|p| p.id == record.id) {
            Some(index) => self.practitioners[index] = record,
            None => self.practitioners.insert(0, record),
        }
        self.last_updated = now;
        self
    }

    pub fn without_practitioner(mut self, id: &str) -> Result<Self, ModelError> {
        let index = self
            .practitioners
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| ModelError::PractitionerNotFound(id.to_string()))?;
        self.practitioners.remove(index);
        self.last_updated = now_millis();
        Ok(self)
    }

    pub fn with_site_config(mut self, site_config: SiteConfig) -> Self {
        self.site_config = site_config;
        self.last_updated = now_millis();
        self
    }

    /// Deterministic JSON encoding used for storage, transfer and equality.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ArchiveState {
    fn default() -> Self {
        Self::new(Vec::new(), SiteConfig::default())
    }
}

fn seed_practitioner() -> PractitionerRecord {
    let work = WorkRecord {
        id: "w1".to_string(),
        name: "《笑口常开，合家纳福》".to_string(),
        technique: "方山县葫芦烙刻市级传承人".to_string(),
        cycle: "创作作品所需一天".to_string(),
        dimensions: "总长 58cm*宽 4.5cm".to_string(),
        images: vec!["https://picsum.photos/seed/hulu1/800/600".to_string()],
        video_url: None,
        price: "120元".to_string(),
        concept: "作品以六枚小葫芦串联，制作成开口笑，寓意笑口常开、吐福纳气。".to_string(),
        social_significance: "依托非遗工坊模式带动村民就业增收。".to_string(),
    };

    PractitionerRecord {
        id: "1".to_string(),
        name: "闫强强".to_string(),
        avatar: Some("https://api.dicebear.com/7.x/avataaars/svg?seed=yan".to_string()),
        contact: "15721688917".to_string(),
        skill_and_level:
            "山西省吕梁市非物质文化遗产代表性项目《络画（方山套色烙刻）》代表性传承人。"
                .to_string(),
        updated_at: None,
        bio: Bio {
            birth_date: Some("1984年4月".to_string()),
            birth_place: Some("山西省吕梁市方山县大武镇西相王村".to_string()),
            experience: vec![
                "自幼跟随孙明喜老姨夫学习套色烙刻，深耕手工艺行业十八年。".to_string(),
                "2015年注册成立离石区子灵文创工作室。".to_string(),
                "长期致力于非遗传承推广工作，积极组织村民开展研学传承活动。".to_string(),
            ],
            awards: vec![
                "2021年，获吕梁市工艺美术大师称号".to_string(),
                "2024年2月，荣获高级三级技师证书，被评为市级非物质文化传承人".to_string(),
            ],
        },
        works: vec![work],
    }
}
