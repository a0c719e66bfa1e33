//! Todo 状态机
//!
//! 模型每次提交完整列表，整表校验通过后原子替换，不存在逐项修改的路径；
//! 校验失败时旧列表原样保留。回给模型的永远是 render 出的文本，结构体本身不回传。

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::core::ToolError;

/// 列表容量上限；超出部分静默丢弃而不是报错
pub const MAX_TODOS: usize = 20;

pub const EMPTY_TODOS: &str = "No todos.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Active,
    Completed,
}

impl TodoStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(TodoStatus::Pending),
            "active" => Some(TodoStatus::Active),
            "completed" => Some(TodoStatus::Completed),
            _ => None,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            TodoStatus::Completed => "[x]",
            TodoStatus::Active => "[>]",
            TodoStatus::Pending => "[ ]",
        }
    }
}

/// 已校验的单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

// 模型提交的单项（未校验）；字段文档会进入 JSON Schema，故用英文
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TodoItemInput {
    /// Imperative description of the task
    pub content: String,
    #[schemars(schema_with = "status_schema")]
    pub status: String,
    /// Present-continuous form shown while the task is active, e.g. "Adding tests"
    #[serde(rename = "activeForm")]
    pub active_form: String,
}

fn status_schema(_: &mut SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(vec![
            "pending".into(),
            "active".into(),
            "completed".into(),
        ]),
        ..Default::default()
    }
    .into()
}

/// 一个会话独占的 Todo 列表，最多一个 active
#[derive(Debug, Clone, Default)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// 整表替换：逐项校验 content/activeForm 非空与 status 合法，再检查 active 数量，最后截断到 MAX_TODOS
    pub fn replace(&mut self, inputs: Vec<TodoItemInput>) -> Result<String, ToolError> {
        let mut validated = Vec::with_capacity(inputs.len());
        let mut active = 0;

        for (i, input) in inputs.into_iter().enumerate() {
            let content = input.content.trim();
            let active_form = input.active_form.trim();
            if content.is_empty() || active_form.is_empty() {
                return Err(ToolError::Validation(format!(
                    "Item {}: content and activeForm required",
                    i
                )));
            }
            let status = TodoStatus::parse(&input.status).ok_or_else(|| {
                ToolError::Validation(format!("Item {}: invalid status '{}'", i, input.status))
            })?;
            if status == TodoStatus::Active {
                active += 1;
            }
            validated.push(TodoItem {
                content: content.to_string(),
                status,
                active_form: active_form.to_string(),
            });
        }

        if active > 1 {
            return Err(ToolError::Validation(
                "Only one task can be active at a time".to_string(),
            ));
        }

        validated.truncate(MAX_TODOS);
        self.items = validated;
        Ok(self.render())
    }

    /// 文本投影：每项一行状态符号 + 末尾 (完成数/总数) 统计
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return EMPTY_TODOS.to_string();
        }
        let mut lines: Vec<String> = self
            .items
            .iter()
            .map(|item| match item.status {
                TodoStatus::Active => {
                    format!("{} {} <- {}", item.status.glyph(), item.content, item.active_form)
                }
                _ => format!("{} {}", item.status.glyph(), item.content),
            })
            .collect();
        let completed = self
            .items
            .iter()
            .filter(|i| i.status == TodoStatus::Completed)
            .count();
        lines.push(format!("\n({}/{} completed)", completed, self.items.len()));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(content: &str, status: &str) -> TodoItemInput {
        TodoItemInput {
            content: content.to_string(),
            status: status.to_string(),
            active_form: format!("{}ing", content),
        }
    }

    #[test]
    fn test_render_empty_sentinel() {
        assert_eq!(TodoList::new().render(), "No todos.");
    }

    #[test]
    fn test_replace_and_render() {
        let mut todos = TodoList::new();
        let out = todos
            .replace(vec![
                item("Write", "completed"),
                item("Test", "active"),
                item("Ship", "pending"),
            ])
            .unwrap();
        assert_eq!(
            out,
            "[x] Write\n[>] Test <- Testing\n[ ] Ship\n\n(1/3 completed)"
        );
    }

    #[test]
    fn test_two_active_rejected_and_previous_kept() {
        let mut todos = TodoList::new();
        todos.replace(vec![item("A", "pending")]).unwrap();
        let before = todos.items().to_vec();

        let err = todos
            .replace(vec![item("B", "active"), item("C", "active")])
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert_eq!(todos.items(), before.as_slice());
    }

    #[test]
    fn test_empty_fields_rejected() {
        let mut todos = TodoList::new();
        let mut bad = item("X", "pending");
        bad.active_form = "  ".to_string();
        let err = todos.replace(vec![bad]).unwrap_err();
        assert!(err.to_string().contains("Item 0"));

        let err = todos.replace(vec![item("", "pending")]).unwrap_err();
        assert!(err.to_string().contains("content and activeForm required"));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let mut todos = TodoList::new();
        let err = todos
            .replace(vec![item("A", "pending"), item("B", "doing")])
            .unwrap_err();
        assert_eq!(err.to_string(), "Item 1: invalid status 'doing'");
        assert!(todos.items().is_empty());
    }

    #[test]
    fn test_overlong_list_truncated() {
        let mut todos = TodoList::new();
        let inputs: Vec<_> = (0..25).map(|i| item(&format!("t{i}"), "pending")).collect();
        let out = todos.replace(inputs).unwrap();
        assert_eq!(todos.items().len(), MAX_TODOS);
        assert_eq!(todos.items()[19].content, "t19");
        assert!(out.ends_with("(0/20 completed)"));
    }

    #[test]
    fn test_completed_count_matches() {
        let mut todos = TodoList::new();
        todos
            .replace(vec![
                item("a", "completed"),
                item("b", "COMPLETED"),
                item("c", "pending"),
            ])
            .unwrap();
        assert!(todos.render().ends_with("(2/3 completed)"));
    }

    #[test]
    fn test_empty_submission_clears() {
        let mut todos = TodoList::new();
        todos.replace(vec![item("a", "pending")]).unwrap();
        assert_eq!(todos.replace(vec![]).unwrap(), "No todos.");
    }
}
