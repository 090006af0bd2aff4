mod config;

use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use hapsync_core::client::RuleCollectionClient;
use hapsync_core::differ::{Classification, DiffResult};
use hapsync_core::effect::Effect;
use hapsync_core::reconciler::{ApplyStatus, ReconcileOutcome, Reconciler, ReconcilerConfig};
use hapsync_core::rule::{CollectionScope, ObservedRule, Rule};
use hapsync_core::schema::schema_for;
use hapsync_core::transaction::{TransactionId, Transactions};
use hapsync_provider_dataplane::DataPlaneClient;

use crate::config::{DEFAULT_FILE, HapsyncFile};

#[derive(Parser)]
#[command(name = "hapsync")]
#[command(about = "Keep HAProxy rule collections in sync through the Data Plane API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_FILE)]
        file: PathBuf,
    },
    /// Show what would change without writing anything
    Plan {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_FILE)]
        file: PathBuf,
    },
    /// Bring every managed collection to its desired state
    Apply {
        /// Path to the configuration file
        #[arg(default_value = DEFAULT_FILE)]
        file: PathBuf,

        /// Compute the plan for every collection but skip the writes
        #[arg(long)]
        dry_run: bool,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, dry_run } => run_apply(&file, dry_run).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "hapsync", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Load and validate a configuration file
fn load(file: &Path) -> Result<HapsyncFile, String> {
    let config = HapsyncFile::load(file).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn connect(config: &HapsyncFile, dry_run: bool) -> Result<Reconciler<DataPlaneClient>, String> {
    let client = DataPlaneClient::new(&config.dataplane).map_err(|e| e.to_string())?;
    let strategy = config.dataplane.api_version.strategy();
    log::debug!(
        "Using Data Plane API {} at {} ({})",
        config.dataplane.api_version,
        config.dataplane.url,
        strategy
    );
    Ok(Reconciler::new(client, strategy).with_config(ReconcilerConfig { dry_run }))
}

fn print_collisions(config: &HapsyncFile) {
    for (scope, collision) in config.desired.collisions() {
        println!(
            "{} {}: {}",
            "Warning:".yellow().bold(),
            scope,
            collision
        );
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let config = load(file)?;
    print_collisions(&config);

    let scopes: Vec<(CollectionScope, &[Rule])> = config.desired.scopes().collect();
    println!(
        "{}",
        format!("✓ {} collections validated successfully.", scopes.len())
            .green()
            .bold()
    );
    for (scope, rules) in scopes {
        println!("  • {} ({} rules)", scope, rules.len());
    }

    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let config = load(file)?;
    print_collisions(&config);
    let reconciler = connect(&config, true)?;

    let mut changed = 0;
    for (scope, desired) in config.desired.scopes() {
        let (observed, result) = reconciler
            .preview(&scope, desired)
            .await
            .map_err(|e| e.to_string())?;
        if result.needs_reconciliation() {
            changed += 1;
        }
        print_collection(&scope, desired, &observed, &result);
    }

    println!();
    if changed == 0 {
        println!("{}", "No changes. Every collection is up to date.".green());
    } else {
        println!(
            "{}",
            format!("{} collections to rewrite ({}).", changed, reconciler.strategy()).bold()
        );
    }
    Ok(())
}

async fn run_apply(file: &Path, dry_run: bool) -> Result<(), String> {
    let config = load(file)?;
    print_collisions(&config);
    let reconciler = connect(&config, dry_run)?;

    // Read everything once so an up-to-date configuration never opens a transaction
    let mut pending = Vec::new();
    for (scope, desired) in config.desired.scopes() {
        let (observed, result) = reconciler
            .preview(&scope, desired)
            .await
            .map_err(|e| e.to_string())?;
        if result.needs_reconciliation() {
            print_collection(&scope, desired, &observed, &result);
            pending.push((scope, desired));
        }
    }

    if pending.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    if dry_run {
        for (scope, desired) in &pending {
            let outcome = reconciler
                .reconcile(scope, desired)
                .await
                .map_err(|e| e.to_string())?;
            print_outcome(scope, &outcome);
        }
        println!();
        println!("{}", "Dry run: nothing was written.".yellow().bold());
        return Ok(());
    }

    println!();
    println!("{}", "Applying changes...".cyan().bold());

    apply_in_transaction(&reconciler, &pending).await?;

    println!();
    println!(
        "{}",
        format!("Apply complete! {} collections rewritten.", pending.len())
            .green()
            .bold()
    );
    Ok(())
}

/// Reconcile every pending scope inside one transaction
///
/// Commits once when every scope succeeded. A failed reconciliation or a
/// failed commit rolls the transaction back.
async fn apply_in_transaction<C>(
    reconciler: &Reconciler<C>,
    pending: &[(CollectionScope, &[Rule])],
) -> Result<(), String>
where
    C: RuleCollectionClient + Transactions,
{
    let client = reconciler.client();
    let transaction = client.begin().await.map_err(|e| e.to_string())?;

    for (scope, desired) in pending {
        let scope = scope.clone().with_transaction(transaction.clone());
        match reconciler.reconcile(&scope, desired).await {
            Ok(outcome) => print_outcome(&scope, &outcome),
            Err(e) => {
                rollback(client, &transaction).await;
                return Err(e.to_string());
            }
        }
    }

    if let Err(e) = client.commit(&transaction).await {
        rollback(client, &transaction).await;
        return Err(e.to_string());
    }
    Ok(())
}

async fn rollback<C: Transactions>(client: &C, transaction: &TransactionId) {
    if let Err(e) = client.rollback(transaction).await {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }
}

fn print_outcome(scope: &CollectionScope, outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::NoChange(_) => {
            println!("  {} {} (up to date)", "✓".green(), scope);
        }
        ReconcileOutcome::Changed { report, .. } => {
            let (symbol, verb) = match report.status {
                ApplyStatus::Applied => ("✓".green(), "applied"),
                ApplyStatus::Skipped => ("•".yellow(), "skipped"),
            };
            println!("  {} {} {}: {}", symbol, scope, verb, report.plan.summary());
            for effect in report.plan.effects() {
                println!("      {}", format_effect(effect));
            }
        }
    }
}

fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Delete { .. } => format!("{} {}", "-".red().bold(), effect),
        Effect::Create { .. } => format!("{} {}", "+".green().bold(), effect),
        Effect::ReplaceAll(_) => format!("{} {}", "~".yellow().bold(), effect),
    }
}

/// Print the classification of each rule and the observed -> desired line diff
fn print_collection(
    scope: &CollectionScope,
    desired: &[Rule],
    observed: &[ObservedRule],
    result: &DiffResult,
) {
    println!();
    let Some(reason) = result.reason else {
        println!("{} {}", "✓".green(), scope.to_string().bold());
        return;
    };

    println!(
        "{} {} ({})",
        "~".yellow().bold(),
        scope.to_string().bold(),
        reason
    );
    println!("  {}", result.summary().to_string().dimmed());

    for entry in &result.entries {
        let position = entry
            .position
            .map(|p| format!("#{}", p))
            .unwrap_or_else(|| "  ".to_string());
        let line = match entry.classification {
            Classification::Unchanged => continue,
            Classification::ContentChanged => {
                format!("{} {} {} changed", "~".yellow(), position, entry.key)
            }
            Classification::Moved { from } => {
                format!("{} {} {} moved from #{}", "↕".cyan(), position, entry.key, from)
            }
            Classification::New => format!("{} {} {} new", "+".green(), position, entry.key),
            Classification::Removed => format!("{} {} {} removed", "-".red(), position, entry.key),
        };
        println!("  {}", line);
    }

    let schema = schema_for(scope.collection);
    let before = render_rules(observed.iter().map(|o| schema.project(&o.rule)));
    let after = render_rules(desired.iter().cloned());
    print_diff(&before, &after);
}

fn render_rules(rules: impl Iterator<Item = Rule>) -> String {
    rules.map(|rule| format!("{}\n", rule.summary())).collect()
}

fn print_diff(before: &str, after: &str) {
    let diff = TextDiff::from_lines(before, after);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("    {}{}", sign, change);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hapsync_core::client::{BoxFuture, ClientError, ClientResult};
    use hapsync_core::rule::{Collection, ParentId};
    use hapsync_core::strategy::ApplyStrategy;
    use hapsync_core::transaction::{TransactionError, TransactionResult};

    use super::*;

    /// Records transaction and write calls; collections always start empty
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
        /// Fail writes to the parent with this name
        fail_parent: Option<&'static str>,
        fail_commit: bool,
    }

    impl RecordingClient {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }
    }

    impl RuleCollectionClient for RecordingClient {
        fn list<'a>(
            &'a self,
            _scope: &'a CollectionScope,
        ) -> BoxFuture<'a, ClientResult<Vec<ObservedRule>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn create_one<'a>(
            &'a self,
            _scope: &'a CollectionScope,
            _index: usize,
            _rule: &'a Rule,
        ) -> BoxFuture<'a, ClientResult<()>> {
            Box::pin(async { Err(ClientError::new("unexpected create")) })
        }

        fn delete_one<'a>(
            &'a self,
            _scope: &'a CollectionScope,
            _index: usize,
        ) -> BoxFuture<'a, ClientResult<()>> {
            Box::pin(async { Err(ClientError::new("unexpected delete")) })
        }

        fn replace_all<'a>(
            &'a self,
            scope: &'a CollectionScope,
            _rules: &'a [Rule],
        ) -> BoxFuture<'a, ClientResult<()>> {
            Box::pin(async move {
                self.record(format!("replace {}", scope.parent.name));
                if self.fail_parent == Some(scope.parent.name.as_str()) {
                    return Err(ClientError::new("conflict").with_status(409));
                }
                Ok(())
            })
        }
    }

    #[async_trait]
    impl Transactions for RecordingClient {
        async fn begin(&self) -> TransactionResult<TransactionId> {
            self.record("begin");
            Ok(TransactionId::new("tx-1"))
        }

        async fn commit(&self, id: &TransactionId) -> TransactionResult<()> {
            self.record("commit");
            if self.fail_commit {
                return Err(TransactionError::Commit {
                    id: id.clone(),
                    message: "version mismatch".to_string(),
                });
            }
            Ok(())
        }

        async fn rollback(&self, _id: &TransactionId) -> TransactionResult<()> {
            self.record("rollback");
            Ok(())
        }
    }

    fn pending(desired: &[Rule]) -> Vec<(CollectionScope, &[Rule])> {
        ["web", "api"]
            .into_iter()
            .map(|name| {
                (
                    CollectionScope::new(ParentId::backend(name), Collection::HttpRequestRules),
                    desired,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn transaction_commits_once_after_every_scope() {
        let desired = vec![Rule::of_type("allow")];
        let reconciler = Reconciler::new(RecordingClient::default(), ApplyStrategy::BulkReplace);

        apply_in_transaction(&reconciler, &pending(&desired))
            .await
            .unwrap();

        assert_eq!(
            reconciler.client().calls(),
            vec!["begin", "replace web", "replace api", "commit"]
        );
    }

    #[tokio::test]
    async fn failed_write_rolls_back_without_commit() {
        let desired = vec![Rule::of_type("allow")];
        let client = RecordingClient {
            fail_parent: Some("api"),
            ..Default::default()
        };
        let reconciler = Reconciler::new(client, ApplyStrategy::BulkReplace);

        let error = apply_in_transaction(&reconciler, &pending(&desired))
            .await
            .unwrap_err();

        assert!(error.contains("backend/api"));
        assert_eq!(reconciler.client().count("rollback"), 1);
        assert_eq!(reconciler.client().count("commit"), 0);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let desired = vec![Rule::of_type("allow")];
        let client = RecordingClient {
            fail_commit: true,
            ..Default::default()
        };
        let reconciler = Reconciler::new(client, ApplyStrategy::BulkReplace);

        let error = apply_in_transaction(&reconciler, &pending(&desired))
            .await
            .unwrap_err();

        assert!(error.contains("version mismatch"));
        assert_eq!(
            reconciler.client().calls().last().map(String::as_str),
            Some("rollback")
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_accepts_dry_run() {
        let cli = Cli::try_parse_from(["hapsync", "apply", "site.json", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Apply { file, dry_run } => {
                assert_eq!(file, PathBuf::from("site.json"));
                assert!(dry_run);
            }
            _ => panic!("Expected apply"),
        }
    }

    #[test]
    fn file_defaults_to_hapsync_json() {
        let cli = Cli::try_parse_from(["hapsync", "plan"]).unwrap();
        match cli.command {
            Commands::Plan { file } => assert_eq!(file, PathBuf::from(DEFAULT_FILE)),
            _ => panic!("Expected plan"),
        }
    }

    #[test]
    fn rendered_rules_diff_by_line() {
        let before = render_rules(vec![Rule::of_type("deny"), Rule::of_type("allow")].into_iter());
        assert_eq!(before, "type=deny\ntype=allow\n");
    }
}
