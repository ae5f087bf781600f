use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use hive_file::format::{decode_value, encode_value};
use hive_sdk::{FileSettingsStore, FileStoreOptions, Settings, ValueKind};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Dump(args) => cmd_dump(args, format),
        Command::Get(args) => cmd_get(args, format),
        Command::Set(args) => cmd_set(args),
        Command::Unset(args) => cmd_unset(args),
        Command::RmTree(args) => cmd_rm_tree(args),
        Command::Copy(args) => cmd_copy(args),
    }
}

// ---------------------------------------------------------------------------
// Opening files
// ---------------------------------------------------------------------------

/// A settings file opened for the duration of one command.
struct OpenFile {
    store: Arc<FileSettingsStore>,
    settings: Settings,
}

impl OpenFile {
    fn open(path: &Path, create: bool) -> anyhow::Result<Self> {
        debug!(file = %path.display(), create, "opening settings file");
        let options = FileStoreOptions {
            create_if_missing: create,
            ..FileStoreOptions::default()
        };
        let store = Arc::new(
            FileSettingsStore::open(path, &options)
                .with_context(|| format!("cannot open {}", path.display()))?,
        );
        Ok(Self {
            settings: Settings::from_shared(store.clone()),
            store,
        })
    }

    fn close(self) -> anyhow::Result<()> {
        let Self { store, settings } = self;
        drop(settings);
        if let Ok(store) = Arc::try_unwrap(store) {
            store.close()?;
        }
        Ok(())
    }
}

/// Walk `a/b/c` down from `root`. Missing segments are created only when
/// `create` is set.
fn navigate(root: &Settings, path: Option<&str>, create: bool) -> anyhow::Result<Settings> {
    let mut current = root.clone();
    let Some(path) = path else {
        return Ok(current);
    };
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !create && !current.has_sub_settings(segment)? {
            bail!("no sub-settings named '{segment}' in path '{path}'");
        }
        current = current.sub_settings(segment)?;
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_dump(args: DumpArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file = OpenFile::open(&args.file, false)?;
    let node = navigate(&file.settings, args.path.as_deref(), false)?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tree_json(&node)?)?);
        }
        OutputFormat::Text => {
            println!("{}", args.file.display().to_string().bold());
            print_tree(&node, 1)?;
        }
    }
    file.close()
}

fn cmd_get(args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let file = OpenFile::open(&args.file, false)?;
    let node = navigate(&file.settings, args.path.as_deref(), false)?;
    let Some(value) = node.get_value(&args.name)? else {
        bail!("no value named '{}'", args.name);
    };
    let encoded = encode_value(&value);
    match format {
        OutputFormat::Json => {
            let doc = json!({
                "name": args.name,
                "type": encoded.tag,
                "class": encoded.class,
                "value": encoded.body,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => println!("{}", encoded.body),
    }
    file.close()
}

fn cmd_set(args: SetArgs) -> anyhow::Result<()> {
    let kind: ValueKind = args
        .kind
        .parse()
        .with_context(|| format!("unknown value type '{}'", args.kind))?;
    let value = decode_value(kind.tag(), None, &args.value)
        .map_err(|reason| anyhow::anyhow!("invalid {} value '{}': {reason}", kind, args.value))?;

    let file = OpenFile::open(&args.file, true)?;
    let node = navigate(&file.settings, args.path.as_deref(), true)?;
    node.set_value(&args.name, Some(value))?;
    drop(node);
    file.close()?;

    println!(
        "{} {} = {} ({})",
        "✓".green().bold(),
        args.name.bold(),
        args.value.cyan(),
        kind
    );
    Ok(())
}

fn cmd_unset(args: NameArgs) -> anyhow::Result<()> {
    let file = OpenFile::open(&args.file, false)?;
    let node = navigate(&file.settings, args.path.as_deref(), false)?;
    let existed = node.has_value(&args.name)?;
    node.unset(&args.name)?;
    drop(node);
    file.close()?;

    if existed {
        println!("{} Removed {}", "✓".green().bold(), args.name.bold());
    } else {
        println!("{} No value named {}", "!".yellow().bold(), args.name.bold());
    }
    Ok(())
}

fn cmd_rm_tree(args: NameArgs) -> anyhow::Result<()> {
    let file = OpenFile::open(&args.file, false)?;
    let node = navigate(&file.settings, args.path.as_deref(), false)?;
    let existed = node.has_sub_settings(&args.name)?;
    node.unset_sub_settings_tree(&args.name)?;
    drop(node);
    file.close()?;

    if existed {
        println!("{} Removed tree {}", "✓".green().bold(), args.name.bold());
    } else {
        println!("{} No sub-settings named {}", "!".yellow().bold(), args.name.bold());
    }
    Ok(())
}

fn cmd_copy(args: CopyArgs) -> anyhow::Result<()> {
    let src = OpenFile::open(&args.src, false)?;
    let dst = OpenFile::open(&args.dst, true)?;
    dst.settings
        .copy_from(&src.settings, args.recursive, args.overwrite)?;
    dst.close()?;
    src.close()?;

    println!(
        "{} Copied {} -> {}{}",
        "✓".green().bold(),
        args.src.display(),
        args.dst.display(),
        if args.recursive { " (recursive)" } else { "" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn print_tree(node: &Settings, depth: usize) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    for name in node.names()? {
        let Some(value) = node.get_value(&name)? else {
            continue;
        };
        let encoded = encode_value(&value);
        println!(
            "{indent}{} = {} {}",
            name.bold(),
            encoded.body.cyan(),
            format!("({})", value.kind()).dimmed()
        );
    }
    for child in node.sub_setting_names()? {
        println!("{indent}{}/", child.yellow());
        print_tree(&node.sub_settings(&child)?, depth + 1)?;
    }
    Ok(())
}

fn tree_json(node: &Settings) -> anyhow::Result<serde_json::Value> {
    let mut values = serde_json::Map::new();
    for name in node.names()? {
        let Some(value) = node.get_value(&name)? else {
            continue;
        };
        let encoded = encode_value(&value);
        let mut entry = json!({ "type": encoded.tag, "value": encoded.body });
        if let Some(class) = encoded.class {
            entry["class"] = json!(class);
        }
        values.insert(name, entry);
    }
    let mut children = serde_json::Map::new();
    for child in node.sub_setting_names()? {
        children.insert(child.clone(), tree_json(&node.sub_settings(&child)?)?);
    }
    Ok(json!({ "values": values, "children": children }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn set(file: &Path, name: &str, kind: &str, value: &str, path: Option<&str>) {
        cmd_set(SetArgs {
            file: file.to_path_buf(),
            name: name.into(),
            kind: kind.into(),
            value: value.into(),
            path: path.map(String::from),
        })
        .unwrap();
    }

    fn reopen(file: &Path) -> OpenFile {
        OpenFile::open(file, false).unwrap()
    }

    #[test]
    fn set_parses_typed_text_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.xml");
        set(&file, "Retries", "Int32", "5", None);
        set(&file, "Host", "String", "ftp.example.com", Some("Ftp/Primary"));
        set(&file, "Bounds", "Rectangle", "1,2,3,4", None);

        let opened = reopen(&file);
        assert_eq!(opened.settings.get_int32("Retries", 0), 5);
        let nested = navigate(&opened.settings, Some("Ftp/Primary"), false).unwrap();
        assert_eq!(nested.get_string("Host", ""), "ftp.example.com");
        assert_eq!(
            opened.settings.get_rectangle("Bounds", Default::default()),
            hive_sdk::Rectangle::new(1, 2, 3, 4)
        );
        opened.close().unwrap();
    }

    #[test]
    fn set_rejects_unknown_type_and_bad_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.xml");
        let bad_kind = SetArgs {
            file: file.clone(),
            name: "x".into(),
            kind: "Int33".into(),
            value: "1".into(),
            path: None,
        };
        assert!(cmd_set(bad_kind).is_err());
        let bad_text = SetArgs {
            file: file.clone(),
            name: "x".into(),
            kind: "Int32".into(),
            value: "many".into(),
            path: None,
        };
        assert!(cmd_set(bad_text).is_err());
    }

    #[test]
    fn navigating_a_missing_path_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.xml");
        set(&file, "a", "Bool", "True", None);
        let opened = reopen(&file);
        assert!(navigate(&opened.settings, Some("missing/child"), false).is_err());
        assert!(!opened.settings.has_sub_settings("missing").unwrap());
        opened.close().unwrap();
    }

    #[test]
    fn unset_and_rm_tree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.xml");
        set(&file, "keep", "Int32", "1", None);
        set(&file, "drop", "Int32", "2", None);
        set(&file, "leaf", "Int32", "3", Some("Tree/Branch"));

        cmd_unset(NameArgs {
            file: file.clone(),
            name: "drop".into(),
            path: None,
        })
        .unwrap();
        cmd_rm_tree(NameArgs {
            file: file.clone(),
            name: "Tree".into(),
            path: None,
        })
        .unwrap();

        let opened = reopen(&file);
        assert_eq!(opened.settings.names().unwrap(), vec!["keep".to_string()]);
        assert!(opened.settings.sub_setting_names().unwrap().is_empty());
        opened.close().unwrap();
    }

    #[test]
    fn copy_respects_overwrite_and_recursion() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.xml");
        let dst = dir.path().join("dst.xml");
        set(&src, "a", "Int32", "1", None);
        set(&src, "b", "Int32", "2", None);
        set(&src, "deep", "Int32", "3", Some("Child"));
        set(&dst, "a", "Int32", "100", None);

        cmd_copy(CopyArgs {
            src: src.clone(),
            dst: dst.clone(),
            recursive: false,
            overwrite: false,
        })
        .unwrap();
        {
            let opened = reopen(&dst);
            assert_eq!(opened.settings.get_int32("a", 0), 100);
            assert_eq!(opened.settings.get_int32("b", 0), 2);
            assert!(!opened.settings.has_sub_settings("Child").unwrap());
            opened.close().unwrap();
        }

        cmd_copy(CopyArgs {
            src,
            dst: dst.clone(),
            recursive: true,
            overwrite: true,
        })
        .unwrap();
        let opened = reopen(&dst);
        assert_eq!(opened.settings.get_int32("a", 0), 1);
        let child = opened.settings.sub_settings("Child").unwrap();
        assert_eq!(child.get_int32("deep", 0), 3);
        drop(child);
        opened.close().unwrap();
    }

    #[test]
    fn json_dump_nests_children() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.xml");
        set(&file, "Theme", "String", "dark", None);
        set(&file, "Port", "UInt16", "21", Some("Ftp"));

        let opened = reopen(&file);
        let doc = tree_json(&opened.settings).unwrap();
        assert_eq!(doc["values"]["Theme"]["type"], "String");
        assert_eq!(doc["values"]["Theme"]["value"], "dark");
        assert_eq!(doc["children"]["Ftp"]["values"]["Port"]["value"], "21");
        opened.close().unwrap();
    }

    #[test]
    fn opening_a_missing_file_for_reading_fails() {
        let missing = PathBuf::from("/nonexistent/dir/settings.xml");
        assert!(OpenFile::open(&missing, false).is_err());
    }
}
