//! 查询 AST：构建器与外部查询执行器、过滤器存储之间交换的可移植树结构

use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 根规则固定使用的过滤字段
pub const SITE_FILTER: &str = "site";

/// AST 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// 整棵树的入口, 只出现在最顶层
    Root,
    Group,
    Rule,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Group => "group",
            NodeType::Rule => "rule",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AST 中的一个节点, 例如：
/// `{"type":"rule","filter":"title","operator":"contains","value":"launch","children":[]}`
///
/// 字段顺序决定了 JSON 输出的键顺序, 不要随意调整.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// 分组的逻辑组合方式 ("AND" / "OR")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// 规则过滤的字段
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<QueryNode>,
}

impl QueryNode {
    /// 空的根节点
    pub fn root(children: Vec<QueryNode>) -> Self {
        Self {
            node_type: NodeType::Root,
            condition: None,
            filter: None,
            operator: None,
            value: None,
            children,
        }
    }

    pub fn group(condition: Combinator, children: Vec<QueryNode>) -> Self {
        Self {
            node_type: NodeType::Group,
            condition: Some(condition.as_str().to_string()),
            filter: None,
            operator: None,
            value: None,
            children,
        }
    }

    pub fn rule(
        filter: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
        children: Vec<QueryNode>,
    ) -> Self {
        Self {
            node_type: NodeType::Rule,
            condition: None,
            filter: Some(filter.into()),
            operator: Some(operator.as_str().to_string()),
            value: Some(value.into()),
            children,
        }
    }

    /// 选择某个站点的根规则, 等价于 `site equals <source>`
    pub fn site(source: impl Into<String>, group: Option<QueryNode>) -> Self {
        Self::rule(SITE_FILTER, Operator::Equals, source, group.into_iter().collect())
    }

    /// 从JSON文本解析AST. 无法解析的输入被视为无效的查询文档
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| BuilderError::invalid_document("$", e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 以先序遍历统计节点总数 (包括自身)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(QueryNode::node_count).sum::<usize>()
    }
}

/// 规则比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Equals,
    Contains,
    Regex,
    RegexCaseInsensitive,
}

impl Operator {
    /// 所有运算符, 按界面中的枚举顺序排列. 第一个即为默认值
    pub const ALL: [Operator; 4] = [
        Operator::Equals,
        Operator::Contains,
        Operator::Regex,
        Operator::RegexCaseInsensitive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::Regex => "regex",
            Operator::RegexCaseInsensitive => "regex_case_insensitive",
        }
    }

    /// 展示给用户的名称
    pub fn label(self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::Contains => "Contains",
            Operator::Regex => "Regex",
            Operator::RegexCaseInsensitive => "Regex (case insensitive)",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| BuilderError::UnknownOperator(s.to_string()))
    }
}

/// 分组的逻辑组合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub const ALL: [Combinator; 2] = [Combinator::And, Combinator::Or];

    pub fn as_str(self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Combinator {
    type Err = BuilderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(Combinator::And),
            "OR" => Ok(Combinator::Or),
            other => Err(BuilderError::UnknownCondition(other.to_string())),
        }
    }
}
