//! Inspect command implementation.

use std::fs;
use std::path::Path;

use console::style;
use graft_classfile::{ClassFile, TRANSFORMED_MARKER};
use graft_core::MethodDescriptor;
use graft_core::descriptor::parse_field_type;
use miette::{Result, miette};

use crate::output;

/// Prints a summary of the class file at `path`.
pub fn execute(path: &Path) -> Result<()> {
    let bytes = fs::read(path).map_err(|e| miette!("Failed to read {}: {}", path.display(), e))?;
    let class = ClassFile::parse(&bytes)?;

    println!("{}", style(class.descriptor()?).cyan().bold());
    output::key_value(
        "version",
        &format!("{}.{}", class.major_version, class.minor_version),
    );
    output::key_value("access", &format!("{:?}", class.access));
    output::key_value("super", class.super_name()?.unwrap_or("-"));

    let interfaces = class.interface_names()?;
    if !interfaces.is_empty() {
        output::key_value("interfaces", &interfaces.join(", "));
    }
    output::key_value(
        "transformed",
        &class.has_annotation(TRANSFORMED_MARKER)?.to_string(),
    );
    output::key_value("blake3", &blake3::hash(&bytes).to_string());

    output::section_header(&format!("Fields ({})", class.fields.len()));
    for field in &class.fields {
        let name = class.member_name(field)?;
        let (field_type, _) = parse_field_type(class.member_descriptor(field)?)?;
        output::list_item(&format!(
            "{} {} {}",
            field_type,
            name,
            style(format!("{:?}", field.access)).dim()
        ));
    }

    output::section_header(&format!("Methods ({})", class.methods.len()));
    for (index, method) in class.methods.iter().enumerate() {
        let signature = MethodDescriptor::parse(
            class.member_name(method)?,
            class.member_descriptor(method)?,
            method.is_static(),
        )?;
        let size = match class.code(index)? {
            Some(body) => format!("{} instructions", body.instructions.len()),
            None => "no body".to_string(),
        };
        output::list_item(&format!("{} {}", signature, style(size).dim()));
    }

    Ok(())
}
