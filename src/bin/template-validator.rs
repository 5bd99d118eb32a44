//! # Form Template Validator
//!
//! Command-line utility that checks form template JSON files before they are
//! deployed, using the same structural check the template store applies on
//! registration.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin template-validator templates/leave-request.json
//! cargo run --bin template-validator ./templates/
//! ```
//!
//! ## Output
//!
//! ```text
//! Validating template file: templates/leave-request.json
//! ✓ Template is valid!
//!
//! Template Summary:
//!   ID: leave-request (version 1)
//!   Name: Leave request
//!   Pages: 2
//!   Fields: 6 (3 required)
//!   Field types:
//!     - date: 2
//!     - text: 4
//!   Workflow: hod_review -> principal_review
//! ```
//!
//! For a directory, every `*.json` file is checked and then all templates are
//! registered together, which also catches duplicate `(id, version)` pairs.
//!
//! ## Exit Codes
//!
//! - `0`: all templates are valid
//! - `1`: a template is invalid or the input could not be read

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tenant_workflow::template::{FormTemplate, InMemoryTemplateStore, validate_template};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <template-file-or-directory>", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} templates/leave-request.json", args[0]);
        eprintln!("  {} ./templates/", args[0]);
        process::exit(1);
    }

    let path = Path::new(&args[1]);

    if path.is_file() {
        validate_single_file(path);
    } else if path.is_dir() {
        validate_directory(path).await;
    } else {
        eprintln!(
            "Error: '{}' is not a valid file or directory",
            path.display()
        );
        process::exit(1);
    }
}

fn validate_single_file(file_path: &Path) {
    println!("Validating template file: {}", file_path.display());

    match load_and_validate_template(file_path) {
        Ok(template) => {
            println!("✓ Template is valid!");
            print_template_summary(&template);
        }
        Err(e) => {
            eprintln!("❌ Template validation failed: {}", e);
            process::exit(1);
        }
    }
}

async fn validate_directory(dir_path: &Path) {
    println!("Validating templates in directory: {}", dir_path.display());

    let mut files: Vec<PathBuf> = match fs::read_dir(dir_path) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect(),
        Err(e) => {
            eprintln!("Error reading directory: {}", e);
            process::exit(1);
        }
    };
    files.sort();

    let mut valid_count = 0;
    let mut error_count = 0;

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\nValidating: {}", name);

        match load_and_validate_template(path) {
            Ok(template) => {
                println!(
                    "  ✓ Valid - {} ({} v{})",
                    template.name, template.id, template.version
                );
                valid_count += 1;
            }
            Err(e) => {
                eprintln!("  ❌ Invalid - {}", e);
                error_count += 1;
            }
        }
    }

    println!("\nValidation Summary:");
    println!("  Valid templates: {}", valid_count);
    println!("  Invalid templates: {}", error_count);

    if error_count > 0 {
        process::exit(1);
    }

    println!("\nTesting template registry loading...");
    let store = InMemoryTemplateStore::new();
    for path in &files {
        if let Err(e) = store.register_from_file(path).await {
            eprintln!("❌ Failed to register {}: {}", path.display(), e);
            process::exit(1);
        }
    }
    println!("✓ Template registry loaded successfully");
    println!("  Total templates loaded: {}", files.len());
}

fn load_and_validate_template(file_path: &Path) -> Result<FormTemplate, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path)?;

    let json_value: serde_json::Value = serde_json::from_str(&content)?;
    let obj = json_value
        .as_object()
        .ok_or("Template must be a JSON object")?;
    for required in ["id", "version", "name"] {
        if !obj.contains_key(required) {
            return Err(format!("Template missing required '{}' field", required).into());
        }
    }

    let template: FormTemplate = serde_json::from_value(json_value)?;
    validate_template(&template)?;

    Ok(template)
}

fn print_template_summary(template: &FormTemplate) {
    println!();
    println!("Template Summary:");
    println!("  ID: {} (version {})", template.id, template.version);
    println!("  Name: {}", template.name);
    if let Some(tenant_id) = &template.tenant_id {
        println!("  Tenant: {}", tenant_id);
    }
    println!("  Pages: {}", template.steps.len());

    let mut type_counts = BTreeMap::new();
    let mut field_count = 0;
    let mut required_count = 0;
    for field in template.fields() {
        field_count += 1;
        if field.required {
            required_count += 1;
        }
        *type_counts.entry(field.field_type.as_str()).or_insert(0) += 1;
    }

    println!("  Fields: {} ({} required)", field_count, required_count);
    println!("  Field types:");
    for (field_type, count) in type_counts {
        println!("    - {}: {}", field_type, count);
    }

    let steps: Vec<&str> = template
        .workflow_steps()
        .iter()
        .map(|step| step.step_name.as_str())
        .collect();
    if steps.is_empty() {
        println!("  Workflow: none (submissions complete immediately)");
    } else {
        println!("  Workflow: {}", steps.join(" -> "));
    }
}
