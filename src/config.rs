//! 配置模块，负责加载JSON配置文件
//!
//! 配置文件与抓取服务共用, 例如:
//!
//! ```text
//! {
//!     "database_url": "...",
//!     "sites": {
//!         "bbc": { "name": "BBC", "path": "sites/bbc.py", "keys": { "title": "Title" } }
//!     },
//!     "tables": { "bbc": "bbc_articles" },
//!     "result_limit": 100
//! }
//! ```
//!
//! 未识别的键 (例如 `database_url`, `path`) 会被忽略.

use crate::error::{BuilderError, Result};
use crate::schema::{Schema, Source, SourceMap};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// 默认返回的最大记录数
pub const DEFAULT_RESULT_LIMIT: u64 = 100;

fn default_result_limit() -> u64 {
    DEFAULT_RESULT_LIMIT
}

/// 应用配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 站点ID到站点描述 (名称与字段) 的映射, 保持配置文件中的顺序
    pub sites: SourceMap,
    /// 站点ID到数据库表名的映射
    #[serde(default)]
    pub tables: IndexMap<String, String>,
    /// 查询返回的最大记录数
    #[serde(default = "default_result_limit")]
    pub result_limit: u64,
}

impl AppConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(BuilderError::Config(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            BuilderError::Config(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        Self::from_json_str(&content).map_err(|e| {
            BuilderError::Config(format!("无法解析JSON配置文件 {}: {}", path_ref.display(), e))
        })
    }

    /// 从JSON文本解析配置
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 由站点配置构建Schema, 同时校验站点与字段
    pub fn schema(&self) -> Result<Schema> {
        Schema::new(self.sites.clone())
    }

    /// 获取站点对应的表名，如果不存在则直接使用站点ID
    pub fn table_name(&self, site: &str) -> String {
        self.tables
            .get(site)
            .cloned()
            .unwrap_or_else(|| site.to_string())
    }

    /// 内置演示配置（用于测试或fallback）
    pub fn demo() -> Self {
        let mut sites = SourceMap::new();
        sites.insert(
            "bbc".to_string(),
            Source::new(
                "BBC",
                [
                    ("category", "Category"),
                    ("section", "Section"),
                    ("summary", "Summary"),
                    ("title", "Title"),
                    ("url", "URL"),
                ],
            ),
        );
        sites.insert(
            "hacker_news".to_string(),
            Source::new(
                "Hacker News",
                [
                    ("score", "Score"),
                    ("title", "Title"),
                    ("url", "URL"),
                    ("user", "User"),
                ],
            ),
        );
        sites.insert(
            "the_guardian".to_string(),
            Source::new(
                "The Guardian",
                [
                    ("headline", "Headline"),
                    ("kicker", "Kicker"),
                    ("standfirst", "Standfirst"),
                    ("url", "URL"),
                ],
            ),
        );

        Self {
            sites,
            tables: IndexMap::new(),
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::QueryTree;
    use std::fs;
    use std::io::Write;
    use std::sync::Arc;

    #[test]
    fn test_load_valid_json_config() {
        // 创建临时配置文件
        let temp_file = std::env::temp_dir().join("site_query_test_config.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(file, r#"{{
            "database_url": "mongodb://localhost:27017",
            "sites": {{
                "bbc": {{ "name": "BBC", "path": "sites/bbc.py", "keys": {{ "title": "Title" }} }},
                "wsj": {{ "name": "WSJ", "keys": {{ "headline": "Headline" }} }}
            }},
            "tables": {{ "bbc": "bbc_articles" }}
        }}"#).unwrap();

        // 测试加载
        let config = AppConfig::from_json_file(&temp_file).unwrap();
        assert_eq!(config.table_name("bbc"), "bbc_articles");
        assert_eq!(config.table_name("wsj"), "wsj");
        assert_eq!(config.result_limit, DEFAULT_RESULT_LIMIT);

        let schema = config.schema().unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.default_source(), "bbc");

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_site_order_follows_config_file() {
        let config = AppConfig::from_json_str(
            r#"{
                "sites": {
                    "wsj": { "name": "WSJ", "keys": { "title": "Title", "author": "Author" } },
                    "bbc": { "name": "BBC", "keys": { "url": "URL" } }
                }
            }"#,
        )
        .unwrap();
        let mut tree = QueryTree::new(Arc::new(config.schema().unwrap()));

        // 新规则默认选择配置中的第一个站点与第一个字段
        let site = tree.add_rule(tree.root()).unwrap();
        assert_eq!(tree.node(site).unwrap().value(), Some("wsj"));
        let group = tree.add_group(site).unwrap().unwrap();
        let rule = tree.add_rule(group).unwrap();
        assert_eq!(tree.node(rule).unwrap().field(), Some("title"));
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = std::env::temp_dir().join("site_query_test_invalid.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = AppConfig::from_json_file(&temp_file);
        assert!(matches!(result, Err(BuilderError::Config(_))));

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::from_json_file("non_existent_file.json");
        assert!(matches!(result, Err(BuilderError::Config(_))));
    }

    #[test]
    fn test_demo_config() {
        let config = AppConfig::demo();
        let schema = config.schema().unwrap();
        assert_eq!(schema.default_source(), "bbc");
        assert_eq!(config.table_name("hacker_news"), "hacker_news");
    }
}
