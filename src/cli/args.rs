//! CLI argument parsing

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    Snapshot(SnapshotArgs),
    Restore(RestoreArgs),
    List(ListArgs),
    Cleanup(CleanupArgs),
    Decide(DecideArgs),
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotArgs {
    pub root: String,
    /// Capture only these paths; the whole workspace otherwise
    pub files: Option<Vec<String>>,
    pub name: Option<String>,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreArgs {
    pub root: String,
    pub snapshot_id: String,
    pub dry_run: bool,
    pub files: Option<Vec<String>>,
    /// Take the snapshot version of every conflicting file without asking
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub root: String,
    pub json: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CleanupArgs {
    pub root: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecideArgs {
    pub context_file: String,
    pub config: Option<String>,
    pub json: bool,
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let rest = &args[2..];
    let command = match args[1].as_str() {
        "snapshot" => Command::Snapshot(parse_snapshot_args(rest)?),
        "restore" => Command::Restore(parse_restore_args(rest)?),
        "list" => Command::List(parse_list_args(rest)?),
        "cleanup" => Command::Cleanup(parse_cleanup_args(rest)?),
        "decide" => Command::Decide(parse_decide_args(rest)?),
        _ => return Err(format!("Unknown command: {}", args[1])),
    };

    Ok(CliArgs { command })
}

/// Split a comma separated `--files` value, dropping empty items
fn parse_file_list(flag: &str, value: &str) -> Result<Vec<String>, String> {
    let files: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if files.is_empty() {
        return Err(format!("{flag} requires at least one path"));
    }
    Ok(files)
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_snapshot_args(args: &[String]) -> Result<SnapshotArgs, String> {
    let mut snapshot_args = SnapshotArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--files" => {
                let value = take_value(args, &mut i, "--files")?;
                snapshot_args.files = Some(parse_file_list("--files", value)?);
            }
            "--name" => {
                snapshot_args.name = Some(take_value(args, &mut i, "--name")?.to_string());
            }
            "--quiet" => {
                snapshot_args.quiet = true;
            }
            arg if !arg.starts_with("--") => {
                if snapshot_args.root.is_empty() {
                    snapshot_args.root = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if snapshot_args.root.is_empty() {
        return Err("Missing required argument: ROOT".to_string());
    }

    Ok(snapshot_args)
}

fn parse_restore_args(args: &[String]) -> Result<RestoreArgs, String> {
    let mut restore_args = RestoreArgs::default();
    let mut positional = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--dry-run" => {
                restore_args.dry_run = true;
            }
            "--force" => {
                restore_args.force = true;
            }
            "--files" => {
                let value = take_value(args, &mut i, "--files")?;
                restore_args.files = Some(parse_file_list("--files", value)?);
            }
            arg if !arg.starts_with("--") => {
                if positional.len() == 2 {
                    return Err(format!("Unexpected argument: {arg}"));
                }
                positional.push(arg.to_string());
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    restore_args.root = positional
        .next()
        .ok_or_else(|| "Missing required argument: ROOT".to_string())?;
    restore_args.snapshot_id = positional
        .next()
        .ok_or_else(|| "Missing required argument: SNAPSHOT_ID".to_string())?;

    Ok(restore_args)
}

fn parse_list_args(args: &[String]) -> Result<ListArgs, String> {
    let mut list_args = ListArgs::default();

    for arg in args {
        match arg.as_str() {
            "--json" => list_args.json = true,
            a if !a.starts_with("--") => {
                if list_args.root.is_empty() {
                    list_args.root = a.to_string();
                } else {
                    return Err(format!("Unexpected argument: {a}"));
                }
            }
            _ => return Err(format!("Unknown option: {arg}")),
        }
    }

    if list_args.root.is_empty() {
        return Err("Missing required argument: ROOT".to_string());
    }

    Ok(list_args)
}

fn parse_cleanup_args(args: &[String]) -> Result<CleanupArgs, String> {
    match args {
        [] => Err("Missing required argument: ROOT".to_string()),
        [root] if !root.starts_with("--") => Ok(CleanupArgs { root: root.clone() }),
        [arg] => Err(format!("Unknown option: {arg}")),
        [_, extra, ..] => Err(format!("Unexpected argument: {extra}")),
    }
}

fn parse_decide_args(args: &[String]) -> Result<DecideArgs, String> {
    let mut decide_args = DecideArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                decide_args.config = Some(take_value(args, &mut i, "--config")?.to_string());
            }
            "--json" => {
                decide_args.json = true;
            }
            arg if !arg.starts_with("--") => {
                if decide_args.context_file.is_empty() {
                    decide_args.context_file = arg.to_string();
                } else {
                    return Err(format!("Unexpected argument: {arg}"));
                }
            }
            _ => return Err(format!("Unknown option: {}", args[i])),
        }
        i += 1;
    }

    if decide_args.context_file.is_empty() {
        return Err("Missing required argument: CONTEXT_FILE".to_string());
    }

    Ok(decide_args)
}
