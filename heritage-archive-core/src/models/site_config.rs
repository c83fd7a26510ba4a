use serde::{Deserialize, Serialize};
use std::fmt;

/// Header and footer content shown around the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub header_title: String,
    pub header_subtitle: String,
    pub footer_title: String,
    pub footer_description: String,
    #[serde(default)]
    pub footer_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_qr_code: Option<String>,
}

impl SiteConfig {
    /// Parses a comma-separated tag list, dropping blanks.
    pub fn parse_tags(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            header_title: "非遗传习学堂".to_string(),
            header_subtitle: "Heritage Learning Lab".to_string(),
            footer_title: "快手公益基金会 · 数字化档案库".to_string(),
            footer_description: "用科技守护传统，让非遗在数字时代焕发新生。".to_string(),
            footer_tags: vec![
                "数字化建档".to_string(),
                "在线编辑".to_string(),
                "传承人赋能".to_string(),
            ],
            footer_qr_code: None,
        }
    }
}

impl fmt::Display for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "header_title:       {}", self.header_title)?;
        writeln!(f, "header_subtitle:    {}", self.header_subtitle)?;
        writeln!(f, "footer_title:       {}", self.footer_title)?;
        writeln!(f, "footer_description: {}", self.footer_description)?;
        writeln!(f, "footer_tags:        {}", self.footer_tags.join(", "))?;
        if let Some(qr) = &self.footer_qr_code {
            let preview: String = qr.chars().take(48).collect();
            writeln!(f, "footer_qr_code:     {}", preview)?;
        }
        Ok(())
    }
}
