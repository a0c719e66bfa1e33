//! 工具注册表
//!
//! 工具集合是封闭的：ToolKind 枚举 + 每个工具一个带类型的参数结构体，参数 JSON Schema 由 schemars 生成。
//! 模型给出的 (name, args) 先经 `ToolCall::parse` 映射为带类型的调用，解析失败即为校验错误，处理函数不会执行。

use schemars::gen::{SchemaGenerator, SchemaSettings};
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::roles::{role_descriptions, ROLES};
use crate::tools::todo::TodoItemInput;

/// 全部能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ExecuteCommand,
    ReadFile,
    WriteFile,
    EditFile,
    UpdateTasks,
    DelegateTask,
    LoadSkill,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::ExecuteCommand,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::EditFile,
        ToolKind::UpdateTasks,
        ToolKind::DelegateTask,
        ToolKind::LoadSkill,
    ];

    /// 基础能力：子智能体可选用的全集，不含委派与技能加载
    pub const BASE: [ToolKind; 5] = [
        ToolKind::ExecuteCommand,
        ToolKind::ReadFile,
        ToolKind::WriteFile,
        ToolKind::EditFile,
        ToolKind::UpdateTasks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ExecuteCommand => "execute-command",
            ToolKind::ReadFile => "read-file",
            ToolKind::WriteFile => "write-file",
            ToolKind::EditFile => "edit-file",
            ToolKind::UpdateTasks => "update-tasks",
            ToolKind::DelegateTask => "delegate-task",
            ToolKind::LoadSkill => "load-skill",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteCommandArgs {
    /// Shell command to run in the workspace root
    pub command: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File path relative to the workspace
    pub path: String,
    /// Only return the first N lines
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// File path relative to the workspace
    pub path: String,
    /// Full file content
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EditFileArgs {
    /// File path relative to the workspace
    pub path: String,
    /// Exact text to replace (first occurrence)
    pub old: String,
    /// Replacement text
    pub new: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateTasksArgs {
    /// The complete task list; replaces the previous one
    pub items: Vec<TodoItemInput>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DelegateTaskArgs {
    /// Short task description (3-5 words)
    pub description: String,
    /// Detailed instructions for the subagent
    pub prompt: String,
    #[schemars(schema_with = "role_schema")]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadSkillArgs {
    /// Name of the skill to load
    pub skill: String,
}

fn role_schema(_: &mut SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(ROLES.iter().map(|r| Value::from(r.name)).collect()),
        ..Default::default()
    }
    .into()
}

/// 解析后的带类型调用
#[derive(Debug, Clone)]
pub enum ToolCall {
    ExecuteCommand(ExecuteCommandArgs),
    ReadFile(ReadFileArgs),
    WriteFile(WriteFileArgs),
    EditFile(EditFileArgs),
    UpdateTasks(UpdateTasksArgs),
    DelegateTask(DelegateTaskArgs),
    LoadSkill(LoadSkillArgs),
}

impl ToolCall {
    pub fn parse(kind: ToolKind, args: Value) -> Result<Self, ToolError> {
        Ok(match kind {
            ToolKind::ExecuteCommand => ToolCall::ExecuteCommand(parse_args(kind, args)?),
            ToolKind::ReadFile => ToolCall::ReadFile(parse_args(kind, args)?),
            ToolKind::WriteFile => ToolCall::WriteFile(parse_args(kind, args)?),
            ToolKind::EditFile => ToolCall::EditFile(parse_args(kind, args)?),
            ToolKind::UpdateTasks => ToolCall::UpdateTasks(parse_args(kind, args)?),
            ToolKind::DelegateTask => ToolCall::DelegateTask(parse_args(kind, args)?),
            ToolKind::LoadSkill => ToolCall::LoadSkill(parse_args(kind, args)?),
        })
    }
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::Validation(format!("Invalid arguments for {}: {}", kind.name(), e)))
}

/// 暴露给模型的工具定义（构造后不可变）
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: String,
    pub input_schema: Value,
}

/// 参数 Schema：内联子结构、不带 $schema / title，Option 字段不加 null 类型
fn schema_of<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
            s.option_add_null_type = false;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<T>();
    let mut value =
        serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("title");
    }
    value
}

/// 工具注册表：按 ToolKind 持有全部定义，按角色给出子集
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// skill_descriptions 写进 load-skill 的描述；进程内只构造一次，保证对模型可见的前缀稳定
    pub fn new(skill_descriptions: &str) -> Self {
        let definitions = ToolKind::ALL
            .into_iter()
            .map(|kind| {
                let (description, input_schema) = match kind {
                    ToolKind::ExecuteCommand => (
                        "Run a shell command in the workspace. Output is stdout+stderr, truncated.".to_string(),
                        schema_of::<ExecuteCommandArgs>(),
                    ),
                    ToolKind::ReadFile => (
                        "Read file contents.".to_string(),
                        schema_of::<ReadFileArgs>(),
                    ),
                    ToolKind::WriteFile => (
                        "Write content to a file, creating parent directories.".to_string(),
                        schema_of::<WriteFileArgs>(),
                    ),
                    ToolKind::EditFile => (
                        "Replace the first exact occurrence of `old` with `new` in a file.".to_string(),
                        schema_of::<EditFileArgs>(),
                    ),
                    ToolKind::UpdateTasks => (
                        "Update the task list. Submit the complete list; at most one task may be active.".to_string(),
                        schema_of::<UpdateTasksArgs>(),
                    ),
                    ToolKind::DelegateTask => (
                        format!(
                            "Spawn a subagent for a focused subtask.\n\n\
                             Subagents run in ISOLATED context - they don't see parent's history.\n\
                             Use this to keep the main conversation clean.\n\n\
                             Agent roles:\n{}",
                            role_descriptions()
                        ),
                        schema_of::<DelegateTaskArgs>(),
                    ),
                    ToolKind::LoadSkill => (
                        format!(
                            "Load a skill to gain specialized knowledge for a task.\n\n\
                             Available skills:\n{}\n\n\
                             When to use:\n\
                             - IMMEDIATELY when user task matches a skill description\n\
                             - Before attempting domain-specific work\n\n\
                             The skill content will be injected into the conversation, giving you\n\
                             detailed instructions and access to resources.",
                            skill_descriptions
                        ),
                        schema_of::<LoadSkillArgs>(),
                    ),
                };
                ToolDefinition {
                    kind,
                    name: kind.name(),
                    description,
                    input_schema,
                }
            })
            .collect();
        Self { definitions }
    }

    pub fn get(&self, kind: ToolKind) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.kind == kind)
    }

    /// 按给定能力集合返回定义，顺序与 ToolKind::ALL 一致
    pub fn definitions_for(&self, kinds: &[ToolKind]) -> Vec<ToolDefinition> {
        self.definitions
            .iter()
            .filter(|d| kinds.contains(&d.kind))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("bash"), None);
    }

    #[test]
    fn test_schema_shapes() {
        let registry = ToolRegistry::new("- pdf: Process PDFs");
        let read = registry.get(ToolKind::ReadFile).unwrap();
        assert_eq!(read.input_schema["type"], "object");
        assert_eq!(read.input_schema["properties"]["limit"]["type"], "integer");
        assert_eq!(read.input_schema["required"], serde_json::json!(["path"]));
        assert!(read.input_schema.get("$schema").is_none());

        let tasks = registry.get(ToolKind::UpdateTasks).unwrap();
        let item = &tasks.input_schema["properties"]["items"]["items"];
        assert_eq!(
            item["properties"]["status"]["enum"],
            serde_json::json!(["pending", "active", "completed"])
        );
        assert!(item["properties"].get("activeForm").is_some());

        let delegate = registry.get(ToolKind::DelegateTask).unwrap();
        assert_eq!(
            delegate.input_schema["properties"]["role"]["enum"],
            serde_json::json!(["explore", "code", "plan"])
        );
    }

    #[test]
    fn test_skill_descriptions_in_load_skill() {
        let registry = ToolRegistry::new("- pdf: Process PDFs");
        let skill = registry.get(ToolKind::LoadSkill).unwrap();
        assert!(skill.description.contains("- pdf: Process PDFs"));
    }

    #[test]
    fn test_parse_valid_and_invalid_args() {
        let ok = ToolCall::parse(
            ToolKind::WriteFile,
            serde_json::json!({"path": "notes.txt", "content": "hi"}),
        )
        .unwrap();
        assert!(matches!(ok, ToolCall::WriteFile(a) if a.path == "notes.txt" && a.content == "hi"));

        let err = ToolCall::parse(ToolKind::EditFile, serde_json::json!({"path": "a"})).unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert!(err.to_string().contains("edit-file"));
    }
}
