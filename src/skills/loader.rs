//! 技能注册表
//!
//! 启动时扫描技能目录的每个子目录，解析其中的 SKILL.md（`---` 包裹的 frontmatter + Markdown 正文）。
//! 只有 name / description 进入系统提示；正文在 load-skill 时才整体返回，内容在进程内保持不变。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::core::ToolError;

const SKILL_FILE: &str = "SKILL.md";

/// 附带资源目录及其展示标签
const RESOURCE_DIRS: &[(&str, &str)] = &[
    ("scripts", "Scripts"),
    ("references", "References"),
    ("assets", "Assets"),
];

fn frontmatter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^---\s*\n(.*?)\n---\s*\n(.*)$").expect("frontmatter regex is valid")
    })
}

/// 单个技能
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub body: String,
    pub dir: PathBuf,
}

impl Skill {
    /// 解析 SKILL.md；缺少 frontmatter 或 name / description 时返回 None
    pub fn parse(text: &str, dir: &Path) -> Option<Self> {
        let caps = frontmatter_re().captures(text)?;
        let frontmatter = caps.get(1)?.as_str();
        let body = caps.get(2)?.as_str();

        let mut name = None;
        let mut description = None;
        for line in frontmatter.trim().lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            match key.trim() {
                "name" => name = Some(value.to_string()),
                "description" => description = Some(value.to_string()),
                _ => {}
            }
        }

        Some(Self {
            name: name.filter(|n| !n.is_empty())?,
            description: description?,
            body: body.trim().to_string(),
            dir: dir.to_path_buf(),
        })
    }

    /// 注入对话的完整内容：标题 + 正文 + 资源提示
    pub fn content(&self) -> String {
        let mut content = format!("# Skill: {}\n\n{}", self.name, self.body);

        let resources: Vec<String> = RESOURCE_DIRS
            .iter()
            .filter_map(|(folder, label)| {
                let files = list_files(&self.dir.join(folder));
                if files.is_empty() {
                    None
                } else {
                    Some(format!("- {}: {}", label, files.join(", ")))
                }
            })
            .collect();

        if !resources.is_empty() {
            content.push_str(&format!(
                "\n\n**Available resources in {}:**\n{}",
                self.dir.display(),
                resources.join("\n")
            ));
        }
        content
    }
}

/// 目录下第一层条目名（排序）；目录不存在视为空
fn list_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// 技能注册表，构造后只读
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Skill>,
}

impl SkillRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 扫描 skills_dir；目录不存在时得到空注册表，单个技能解析失败只记日志
    pub fn load(skills_dir: impl AsRef<Path>) -> Self {
        let skills_dir = skills_dir.as_ref();
        let mut skills = BTreeMap::new();

        let Ok(entries) = std::fs::read_dir(skills_dir) else {
            tracing::debug!(dir = %skills_dir.display(), "skills directory not found");
            return Self { skills };
        };

        for entry in entries.flatten() {
            let dir = entry.path();
            let skill_md = dir.join(SKILL_FILE);
            if !dir.is_dir() || !skill_md.is_file() {
                continue;
            }
            let text = match std::fs::read_to_string(&skill_md) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %skill_md.display(), error = %e, "failed to read skill");
                    continue;
                }
            };
            match Skill::parse(&text, &dir) {
                Some(skill) => {
                    skills.insert(skill.name.clone(), skill);
                }
                None => {
                    tracing::warn!(path = %skill_md.display(), "invalid SKILL.md frontmatter, skipped");
                }
            }
        }

        tracing::info!("Loaded {} skills", skills.len());
        Self { skills }
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// `- name: description` 列表，用于系统提示
    pub fn descriptions(&self) -> String {
        if self.skills.is_empty() {
            return "(no skills available)".to_string();
        }
        self.skills
            .values()
            .map(|s| format!("- {}: {}", s.name, s.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn content(&self, name: &str) -> Result<String, ToolError> {
        self.skills
            .get(name)
            .map(Skill::content)
            .ok_or_else(|| ToolError::UnknownSkill {
                name: name.to_string(),
                available: self.available(),
            })
    }

    fn available(&self) -> String {
        if self.skills.is_empty() {
            "none".to_string()
        } else {
            self.names().join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_skill(root: &Path, dir: &str, text: &str) -> PathBuf {
        let skill_dir = root.join(dir);
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join(SKILL_FILE), text).unwrap();
        skill_dir
    }

    #[test]
    fn test_parse_frontmatter() {
        let skill = Skill::parse(
            "---\nname: pdf\ndescription: \"Process PDF files\"\n---\n\n# PDF\nUse pdftotext.\n",
            Path::new("/skills/pdf"),
        )
        .unwrap();
        assert_eq!(skill.name, "pdf");
        assert_eq!(skill.description, "Process PDF files");
        assert_eq!(skill.body, "# PDF\nUse pdftotext.");
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        assert!(Skill::parse("# no frontmatter", Path::new(".")).is_none());
        assert!(Skill::parse("---\nname: x\n---\nbody", Path::new(".")).is_none());
    }

    #[test]
    fn test_load_and_descriptions() {
        let dir = TempDir::new().unwrap();
        write_skill(dir.path(), "pdf", "---\nname: pdf\ndescription: PDFs\n---\nbody");
        write_skill(dir.path(), "git", "---\nname: git\ndescription: Git help\n---\nbody");
        write_skill(dir.path(), "broken", "no frontmatter");

        let registry = SkillRegistry::load(dir.path());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.descriptions(), "- git: Git help\n- pdf: PDFs");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let registry = SkillRegistry::load("/definitely/not/here");
        assert!(registry.is_empty());
        assert_eq!(registry.descriptions(), "(no skills available)");
        let err = registry.content("pdf").unwrap_err();
        assert_eq!(err.to_observation(), "Error: Unknown skill 'pdf'. Available: none");
    }

    #[test]
    fn test_content_lists_resources() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(
            dir.path(),
            "pdf",
            "---\nname: pdf\ndescription: PDFs\n---\nUse the scripts.",
        );
        std::fs::create_dir_all(skill_dir.join("scripts")).unwrap();
        std::fs::write(skill_dir.join("scripts/b.sh"), "").unwrap();
        std::fs::write(skill_dir.join("scripts/a.py"), "").unwrap();

        let registry = SkillRegistry::load(dir.path());
        let content = registry.content("pdf").unwrap();
        assert!(content.starts_with("# Skill: pdf\n\nUse the scripts."));
        assert!(content.contains("**Available resources in"));
        assert!(content.ends_with("- Scripts: a.py, b.sh"));
        assert_eq!(content, registry.content("pdf").unwrap());
    }

    #[test]
    fn test_unknown_skill_lists_names() {
        let dir = TempDir::new().unwrap();
        write_skill(dir.path(), "pdf", "---\nname: pdf\ndescription: PDFs\n---\nx");
        write_skill(dir.path(), "git", "---\nname: git\ndescription: Git\n---\ny");
        let err = SkillRegistry::load(dir.path()).content("docker").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown skill 'docker'. Available: git, pdf"
        );
    }
}
