//! 技能系统
//!
//! 技能是一个目录，按需把领域知识注入对话：
//! ```text
//! skills/
//! ├── pdf/
//! │   ├── SKILL.md        # frontmatter(name, description) + 正文
//! │   ├── scripts/        # 可选
//! │   ├── references/     # 可选
//! │   └── assets/         # 可选
//! └── ...
//! ```

mod loader;

pub use loader::{Skill, SkillRegistry};
