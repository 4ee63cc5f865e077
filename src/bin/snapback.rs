//! snapback - Main binary entry point

use snapback::cli::args::{
    CleanupArgs, Command, DecideArgs, ListArgs, RestoreArgs, SnapshotArgs, parse_args,
};
use snapback::cli::output::{
    format_decision, format_decision_json, format_restore_outcome, format_snapshot_list,
    format_snapshot_list_json,
};
use snapback::config::state_path;
use snapback::io::store::JsonFileStore;
use snapback::models::{OperationProgress, SaveContext};
use snapback::services::coordinator::restore::PreferSnapshot;
use snapback::services::coordinator::CoordinatorOptions;
use snapback::services::decision::validate_context;
use snapback::{
    DecisionEngine, OperationCoordinator, RestoreOptions, RestoreOutcome, SnapbackConfig,
    SnapshotRequest,
};
use std::process;
use std::sync::Arc;

fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug snapback snapshot .
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let exit_code = match &cli_args.command {
        Command::Snapshot(a) => handle_snapshot(a),
        Command::Restore(a) => handle_restore(a),
        Command::List(a) => handle_list(a),
        Command::Cleanup(a) => handle_cleanup(a),
        Command::Decide(a) => handle_decide(a),
    };

    process::exit(exit_code);
}

fn exit_code_for(err: &snapback::Error) -> i32 {
    match err {
        snapback::Error::InvalidInput(_)
        | snapback::Error::EmptyCapture
        | snapback::Error::Validation(_)
        | snapback::Error::NotFound(_) => 2,
        _ => 4,
    }
}

fn open_workspace(root: &str, quiet: bool) -> Result<OperationCoordinator, snapback::Error> {
    let config = SnapbackConfig::for_workspace(root)?;
    let store = Arc::new(JsonFileStore::open(state_path(root))?);

    let mut options = CoordinatorOptions {
        capture: config.capture,
        storage: config.storage,
        ..CoordinatorOptions::default()
    };
    if !quiet {
        options.progress_notifier = Some(Arc::new(|p: &OperationProgress| {
            eprintln!("[{:3.0}%] {}", p.progress, p.message);
        }));
    }

    OperationCoordinator::new(root, store, options)
}

fn handle_snapshot(args: &SnapshotArgs) -> i32 {
    let mut coordinator = match open_workspace(&args.root, args.quiet) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let mut request = match &args.files {
        Some(files) => SnapshotRequest::incremental(files.clone()),
        None => SnapshotRequest::full_workspace(),
    };
    if let Some(name) = &args.name {
        request = request.with_name(name.clone());
    }

    match coordinator.coordinate_snapshot_creation(request, snapback::now_ms()) {
        Ok(id) => {
            if args.quiet {
                println!("{id}");
            } else if let Some(s) = coordinator.orchestrator().get_snapshot(&id) {
                println!("Snapshot saved: {} ({} files)", s.name, s.file_count);
                println!("ID: {id}");
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

fn handle_restore(args: &RestoreArgs) -> i32 {
    let mut coordinator = match open_workspace(&args.root, false) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };
    if args.force {
        coordinator.set_conflict_resolver(Some(Box::new(PreferSnapshot)));
    }

    let options = RestoreOptions {
        dry_run: args.dry_run,
        files: args.files.clone(),
    };

    match coordinator.restore_to_snapshot(&args.snapshot_id, &options, snapback::now_ms()) {
        Ok(outcome) => {
            print!("{}", format_restore_outcome(&args.snapshot_id, &outcome));
            if matches!(outcome, RestoreOutcome::Cancelled) {
                3
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

fn handle_list(args: &ListArgs) -> i32 {
    let coordinator = match open_workspace(&args.root, true) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    let snapshots = coordinator.orchestrator().list_snapshots();
    if args.json {
        println!("{}", format_snapshot_list_json(&snapshots));
    } else {
        print!("{}", format_snapshot_list(&snapshots));
    }
    0
}

fn handle_cleanup(args: &CleanupArgs) -> i32 {
    let mut coordinator = match open_workspace(&args.root, true) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    match coordinator.cleanup(snapback::now_ms()) {
        Ok(removed) => {
            println!("Removed {removed} expired snapshots");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

fn handle_decide(args: &DecideArgs) -> i32 {
    let config = match &args.config {
        Some(path) => SnapbackConfig::load(path),
        None => Ok(SnapbackConfig::default()),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };

    let context: SaveContext = match std::fs::read_to_string(&args.context_file)
        .map_err(snapback::Error::from)
        .and_then(|text| serde_json::from_str(&text).map_err(snapback::Error::from))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.context_file);
            return 2;
        }
    };

    if let Err(e) = validate_context(&context) {
        eprintln!("Error: {e}");
        return 2;
    }

    let decision = DecisionEngine::new(config.decision).make_decision(&context);
    if args.json {
        println!("{}", format_decision_json(&decision));
    } else {
        print!("{}", format_decision(&decision));
    }
    0
}

fn print_help() {
    println!("snapback - Protect workspaces from risky bursts of edits");
    println!();
    println!("USAGE:");
    println!("    snapback snapshot <ROOT> [--files a,b] [--name NAME] [--quiet]");
    println!("    snapback restore <ROOT> <SNAPSHOT_ID> [--dry-run] [--force] [--files a,b]");
    println!("    snapback list <ROOT> [--json]");
    println!("    snapback cleanup <ROOT>");
    println!("    snapback decide <CONTEXT_FILE> [--config FILE] [--json]");
    println!();
    println!("OPTIONS:");
    println!("    --files <LIST>   Comma separated workspace-relative paths");
    println!("    --name <NAME>    Display name for the snapshot");
    println!("    --dry-run        Show conflicts before writing anything");
    println!("    --force          With --dry-run, take the snapshot version of every conflict");
    println!("    --json           Output as JSON");
    println!("    --quiet          Suppress progress output");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!();
    println!("Configuration is read from <ROOT>/.snapback/config.json.");
    println!("Set RUST_LOG=debug for diagnostic logging.");
    println!();
    println!("EXIT CODES:");
    println!("    0  Success");
    println!("    2  Invalid input");
    println!("    3  Restore cancelled");
    println!("    4  Other error");
}

fn print_version() {
    println!("snapback {}", env!("CARGO_PKG_VERSION"));
}
