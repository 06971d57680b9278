//! 规则引擎命令行工具
//!
//! 加载条件目录与规则集文件，对给定的参数上下文评估规则集并以 JSON 输出结果。

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use condition_rules_shared::config::AppConfig;
use condition_rules_shared::observability;
use rule_engine::{
    ArgumentContext, Catalogue, InMemoryRulesetSource, LintFinding, RuleEngine, RulesetLinter,
    RulesetQuery, RulesetSource,
};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 条件规则引擎
#[derive(Parser, Debug)]
#[command(name = "rule-engine")]
#[command(version, about = "条件规则集评估工具")]
#[command(propagate_version = true)]
struct Cli {
    /// 条件目录文件（覆盖配置中的 engine.catalogue_path）
    #[arg(long, global = true)]
    catalogue: Option<PathBuf>,

    /// 规则集文件（覆盖配置中的 engine.rulesets_path）
    #[arg(long, global = true)]
    rulesets: Option<PathBuf>,

    /// 规则集来源 ID
    #[arg(short, long, global = true, default_value = "default")]
    source: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 评估参数上下文
    ///
    /// 默认输出第一个匹配的规则集；`--all` 输出所有匹配。
    Evaluate {
        /// 参数上下文 JSON 文件，省略或为 "-" 时从 stdin 读取
        context: Option<PathBuf>,

        /// 多匹配模式
        #[arg(long)]
        all: bool,

        /// 输出逐条规则的评估记录
        #[arg(long)]
        trace: bool,
    },

    /// 检查规则集
    Lint,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    observability::init(&config.observability)?;

    let catalogue_path = cli
        .catalogue
        .clone()
        .or_else(|| config.engine.catalogue_path.as_ref().map(PathBuf::from))
        .context("未指定条件目录文件（--catalogue 或 engine.catalogue_path）")?;
    let rulesets_path = cli
        .rulesets
        .clone()
        .or_else(|| config.engine.rulesets_path.as_ref().map(PathBuf::from))
        .context("未指定规则集文件（--rulesets 或 engine.rulesets_path）")?;

    let catalogue = Catalogue::from_file(&catalogue_path)
        .with_context(|| format!("加载条件目录失败: {}", catalogue_path.display()))?;

    let store = InMemoryRulesetSource::new();
    let loaded = store
        .load_sources_from_file(&rulesets_path)
        .with_context(|| format!("加载规则集失败: {}", rulesets_path.display()))?;
    info!(rulesets = loaded, sources = store.len(), "规则集已加载");

    if !store.source_ids().contains(&cli.source) {
        warn!(source_id = %cli.source, "规则集文件中没有该来源");
    }

    match cli.command {
        Commands::Evaluate {
            context,
            all,
            trace,
        } => {
            let context = read_context(context.as_deref())?;

            if config.engine.lint_on_load {
                warn_missing_inputs(&catalogue, &store, &cli.source, &context)?;
            }

            let mut engine = RuleEngine::new(Arc::new(store));
            if trace || config.engine.trace_enabled {
                engine = engine.with_trace();
            }
            engine.register_catalogue(cli.source.clone(), catalogue);

            if config.engine.lint_on_load {
                engine.lint(&cli.source)?;
            }

            let output = if all {
                serde_json::to_string_pretty(&engine.evaluate_all(&cli.source, &context)?)?
            } else {
                serde_json::to_string_pretty(&engine.evaluate_first(&cli.source, &context)?)?
            };
            println!("{}", output);
        }
        Commands::Lint => {
            let engine = RuleEngine::new(Arc::new(store));
            engine.register_catalogue(cli.source.clone(), catalogue);

            let report = engine.lint(&cli.source)?;
            let findings: BTreeMap<String, Vec<LintFinding>> = report.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&findings)?);

            if !findings.is_empty() {
                bail!("{} 个规则集存在问题", findings.len());
            }
        }
    }

    Ok(())
}

fn read_context(path: Option<&Path>) -> Result<ArgumentContext> {
    let json = match path {
        Some(p) if p.as_os_str() != "-" => std::fs::read_to_string(p)
            .with_context(|| format!("读取参数上下文失败: {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    ArgumentContext::from_json(&json).context("参数上下文必须是 JSON 对象")
}

/// 提示上下文中缺少的、规则集可能读取的键
fn warn_missing_inputs(
    catalogue: &Catalogue,
    store: &InMemoryRulesetSource,
    source_id: &str,
    context: &ArgumentContext,
) -> Result<()> {
    for ruleset in store.fetch(source_id, &RulesetQuery::default())? {
        for key in RulesetLinter::required_context_keys(catalogue, &ruleset) {
            if !context.contains_key(&key) {
                warn!(ruleset_id = %ruleset.id, key = %key, "参数上下文缺少键");
            }
        }
    }
    Ok(())
}
