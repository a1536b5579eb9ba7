/// reStructuredText API reference generator

use anyhow::Result;
use avlos_ir::*;
use serde::{Deserialize, Serialize};

use crate::{Codegen, GeneratedCode, GeneratedFile, AUTOGEN_NOTICE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RstGeneratorConfig {
    pub output_file: String,
}

pub struct RstGenerator {
    pub config: RstGeneratorConfig,
}

impl Codegen for RstGenerator {
    fn generate(&self, tree: &DeviceTree) -> Result<GeneratedCode> {
        Ok(GeneratedCode {
            files: vec![GeneratedFile {
                path: self.config.output_file.clone(),
                content: generate_reference(tree),
            }],
        })
    }

    fn language(&self) -> &str {
        "rst"
    }
}

fn underline(title: &str, ch: char) -> String {
    format!("{}\n{}\n", title, ch.to_string().repeat(title.chars().count()))
}

/// Heading path always starts at the root, whatever the build options.
fn heading(tree: &DeviceTree, id: EntityId) -> String {
    let root = &tree.root().info.name;
    if tree.options().include_root_name {
        tree.full_name(id)
    } else {
        format!("{}.{}", root, tree.full_name(id))
    }
}

fn unit_text(unit: Option<&Unit>) -> String {
    unit.map(|u| u.name().to_string())
        .unwrap_or_else(|| "Not defined".to_string())
}

fn generate_reference(tree: &DeviceTree) -> String {
    let mut out = String::new();
    for line in AUTOGEN_NOTICE.lines() {
        out.push_str(&format!(".. {}\n", line));
    }
    out.push('\n');
    out.push_str(&underline(
        &format!("{} API Reference", tree.root().info.name),
        '=',
    ));
    if let Some(summary) = &tree.root().info.summary {
        out.push_str(&format!("\n{}\n", summary.trim()));
    }
    out.push_str(&format!("\nProtocol hash: ``{}``\n", tree.hash_string()));

    for id in tree.endpoints() {
        let entity = &tree[id];
        out.push('\n');
        if let Some(target) = &entity.info().rst_target {
            out.push_str(&format!(".. _{}:\n\n", target));
        }
        out.push_str(&underline(&heading(tree, id), '-'));
        out.push('\n');
        out.push_str(&format!("- Endpoint ID: {}\n", entity.ep_id().unwrap_or_default()));

        match entity {
            Entity::Function(f) => {
                out.push_str(&format!("- Return Type: {}\n", f.dtype));
                out.push_str(&format!("- Unit: {}\n", unit_text(f.unit.as_ref())));
                if f.arguments.is_empty() {
                    out.push_str("- Arguments: None\n");
                } else {
                    out.push_str("- Arguments:\n\n");
                    out.push_str("  +------------------+------------+------------------+\n");
                    out.push_str("  | Name             | Type       | Unit             |\n");
                    out.push_str("  +==================+============+==================+\n");
                    for arg in &f.arguments {
                        out.push_str(&format!(
                            "  | {:<16} | {:<10} | {:<16} |\n",
                            arg.name,
                            arg.dtype.nickname(),
                            unit_text(arg.unit.as_ref())
                        ));
                        out.push_str("  +------------------+------------+------------------+\n");
                    }
                }
            }
            Entity::Enum(e) => {
                out.push_str(&format!("- Data Type: {}\n", OPTION_WIRE_TYPE));
                out.push_str(&format!("- Options: {}\n", e.options.options().join(", ")));
            }
            Entity::Bitmask(b) => {
                out.push_str(&format!("- Data Type: {}\n", OPTION_WIRE_TYPE));
                out.push_str(&format!("- Flags: {}\n", b.flags.flags().join(", ")));
            }
            _ => {
                out.push_str(&format!(
                    "- Data Type: {}\n",
                    entity.wire_type().unwrap_or(DataType::Void)
                ));
                out.push_str(&format!("- Unit: {}\n", unit_text(entity.unit())));
            }
        }

        if let Some(summary) = &entity.info().summary {
            out.push_str(&format!("\n{}\n", summary.trim()));
        }
    }

    out
}
