use std::sync::Arc;
use std::time::Duration;

use chainkit_core::api::{
    AppConfig, CancelSignal, CliError, CommandInvocation, CommandResult, CrudCommand, CrudVerb,
    PluginManager, ResourceType,
};
use futures::StreamExt;

use crate::commands::cli::{parse_options, Args, Commands, CreateArgs, GetArgs, TargetArgs};
use crate::render::{render_tree, ProgressView};

/// Where command output goes. Stdout in the binary, a buffer in tests.
pub type Output = Arc<dyn Fn(&str) + Send + Sync>;

pub struct App {
    manager: PluginManager,
    cfg: AppConfig,
    expand: bool,
    interactive: bool,
    out: Output,
}

impl App {
    pub fn new(manager: PluginManager, cfg: AppConfig) -> Self {
        Self {
            manager,
            cfg,
            expand: false,
            interactive: atty::is(atty::Stream::Stderr),
            out: Arc::new(|text: &str| print!("{text}")),
        }
    }

    pub fn with_output(mut self, out: Output) -> Self {
        self.out = out;
        self.interactive = false;
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Run one command between the pre and post hooks of every plugin.
    /// Returns the process exit code: 0 on success, 1 when a task list failed.
    pub async fn run(&self, args: &Args, cancel: CancelSignal) -> Result<i32, CliError> {
        let invocation = self.invocation(args);
        let hooks = self.manager.command_hooks();

        for hook in &hooks {
            hook.pre(&invocation, &self.manager).await.map_err(|e| {
                CliError::Command(format!("{} refused '{}': {e}", hook.name(), invocation.command))
            })?;
        }

        tracing::debug!(command = %invocation.command, "running command");
        let result = self.execute(args, &cancel).await;

        let outcome = match &result {
            Ok(0) => CommandResult::ok(),
            Ok(code) => CommandResult::failed(format!("exit code {code}")),
            Err(e) => CommandResult::failed(e.to_string()),
        };
        for hook in &hooks {
            if let Err(e) = hook.post(&invocation, &outcome, &self.manager).await {
                tracing::warn!(hook = hook.name(), error = %e, "post-command hook failed");
            }
        }
        result
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    fn invocation(&self, args: &Args) -> CommandInvocation {
        let target = match &args.command {
            Commands::Create(c) => Some((CrudVerb::Create, c.kind.as_str(), Some(c.name.as_str()))),
            Commands::Delete(t) => Some((CrudVerb::Delete, t.kind.as_str(), Some(t.name.as_str()))),
            Commands::Start(t) => Some((CrudVerb::Start, t.kind.as_str(), Some(t.name.as_str()))),
            Commands::Stop(t) => Some((CrudVerb::Stop, t.kind.as_str(), Some(t.name.as_str()))),
            Commands::Describe(t) => {
                Some((CrudVerb::Describe, t.kind.as_str(), Some(t.name.as_str())))
            }
            Commands::Get(g) => Some((CrudVerb::Get, g.kind.as_str(), None)),
            Commands::Plugins | Commands::Reset(_) => None,
        };

        let Some((verb, kind, name)) = target else {
            return CommandInvocation {
                command: args.command.name().to_string(),
                ..Default::default()
            };
        };

        let plugin = self
            .manager
            .resolve_kind(args.plugin.as_deref(), kind)
            .map(|rt| rt.plugin().to_string())
            .unwrap_or_default();
        let mut invocation = CommandInvocation::crud(verb, &plugin, kind, name);
        if plugin.is_empty() {
            invocation.plugin = None;
        }
        let raw = match &args.command {
            Commands::Create(c) => c.options.as_slice(),
            Commands::Get(g) => g.options.as_slice(),
            _ => &[],
        };
        if let Ok(pairs) = parse_options(raw) {
            invocation.options = options_json(pairs);
        }
        invocation
    }

    async fn execute(&self, args: &Args, cancel: &CancelSignal) -> Result<i32, CliError> {
        let plugin = args.plugin.as_deref();
        match &args.command {
            Commands::Create(c) => self.create(plugin, c, cancel).await,
            Commands::Delete(t) => self.transition(CrudVerb::Delete, plugin, t, cancel).await,
            Commands::Start(t) => self.transition(CrudVerb::Start, plugin, t, cancel).await,
            Commands::Stop(t) => self.transition(CrudVerb::Stop, plugin, t, cancel).await,
            Commands::Get(g) => self.get(plugin, g, cancel).await,
            Commands::Describe(t) => self.describe(plugin, t, cancel).await,
            Commands::Plugins => Ok(self.plugins()),
            Commands::Reset(r) => {
                if !r.yes {
                    return Err(CliError::Command(
                        "reset forgets every resource; pass --yes to confirm".to_string(),
                    ));
                }
                self.manager.reset_all().await?;
                self.print("All resources were reset.\n");
                Ok(0)
            }
        }
    }

    async fn create(
        &self,
        plugin: Option<&str>,
        args: &CreateArgs,
        cancel: &CancelSignal,
    ) -> Result<i32, CliError> {
        let rt = self.manager.resolve_kind(plugin, &args.kind)?;
        let cmd = rt.crud_command(CrudVerb::Create);
        let options = create_options(&cmd, &args.options)?;

        let created = self
            .run_mutation(&cmd, &args.name, args.args.clone(), options, cancel)
            .await?;
        if !created {
            return Ok(1);
        }

        if args.start || cmd.start_on_create {
            let start = rt.crud_command(CrudVerb::Start);
            let started = self
                .run_mutation(&start, &args.name, Vec::new(), serde_json::Value::Null, cancel)
                .await?;
            if !started {
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn transition(
        &self,
        verb: CrudVerb,
        plugin: Option<&str>,
        args: &TargetArgs,
        cancel: &CancelSignal,
    ) -> Result<i32, CliError> {
        let rt = self.manager.resolve_kind(plugin, &args.kind)?;
        let cmd = rt.crud_command(verb);
        let done = self
            .run_mutation(&cmd, &args.name, Vec::new(), serde_json::Value::Null, cancel)
            .await?;
        Ok(if done { 0 } else { 1 })
    }

    /// Follow one mutation to the end and print its task tree. `Ok(false)`
    /// when the task list failed.
    async fn run_mutation(
        &self,
        cmd: &CrudCommand,
        name: &str,
        args: Vec<String>,
        options: serde_json::Value,
        cancel: &CancelSignal,
    ) -> Result<bool, CliError> {
        let stream = cmd
            .mutate(&self.manager, name, args, options, cancel.clone())
            .await?;

        let view = ProgressView::new(
            &cmd.progress_title(name),
            Duration::from_millis(self.cfg.tasks.render_interval_ms.max(1)),
            self.interactive,
        );
        let update = view.follow(stream).await;
        let collapse = self.cfg.tasks.collapse_subtasks && !self.expand;
        self.print(&render_tree(&update.tasks, collapse));

        if cancel.is_cancelled() {
            return Err(CliError::Cancelled);
        }
        match update.error() {
            Some(error) => {
                tracing::warn!(command = %cmd.command, name, error, "task list failed");
                self.print(&format!("Error: {error}\n"));
                Ok(false)
            }
            None => {
                self.print(&format!("{}\n", cmd.done_title(name)));
                for note in &update.notes {
                    self.print(&format!("  {note}\n"));
                }
                Ok(true)
            }
        }
    }

    async fn get(
        &self,
        plugin: Option<&str>,
        args: &GetArgs,
        cancel: &CancelSignal,
    ) -> Result<i32, CliError> {
        let rt = self.manager.resolve_kind(plugin, &args.kind)?;
        let cmd = rt.crud_command(CrudVerb::Get);
        let options = options_json(parse_options(&args.options).map_err(CliError::Command)?);
        let mut stream = cmd.list(&self.manager, options, cancel.clone()).await?;

        if !args.watch {
            let resources = stream.next().await.unwrap_or_default();
            self.print(&rt.format_table(&resources));
            return Ok(0);
        }

        while let Some(resources) = stream.next().await {
            self.print(&rt.format_table(&resources));
            self.print("\n");
        }
        if cancel.is_cancelled() {
            return Err(CliError::Cancelled);
        }
        Ok(0)
    }

    async fn describe(
        &self,
        plugin: Option<&str>,
        args: &TargetArgs,
        cancel: &CancelSignal,
    ) -> Result<i32, CliError> {
        let rt = self.manager.resolve_kind(plugin, &args.kind)?;
        let cmd = rt.crud_command(CrudVerb::Describe);
        let resource = cmd
            .describe(&self.manager, &args.name, cancel.clone())
            .await?;
        let debug = self
            .manager
            .manager(rt.plugin(), rt.kind())
            .and_then(|m| m.adapter(&args.name))
            .map(|adapter| adapter.debug_info())
            .unwrap_or_else(|_| serde_json::json!({}));
        self.print(&rt.format_describe(&resource, &debug));
        Ok(0)
    }

    fn plugins(&self) -> i32 {
        let mut out = String::new();
        for plugin in self.manager.plugins() {
            let deps = plugin.dependencies();
            if deps.is_empty() {
                out.push_str(&format!("{}\n", plugin.name()));
            } else {
                out.push_str(&format!(
                    "{} (depends on: {})\n",
                    plugin.name(),
                    deps.join(", ")
                ));
            }
            for rt in plugin.resource_types() {
                out.push_str(&describe_commands(&rt));
            }
        }
        if out.is_empty() {
            out.push_str("No plugins loaded.\n");
        }
        self.print(&out);
        0
    }

    fn print(&self, text: &str) {
        (self.out)(text);
    }
}

fn describe_commands(rt: &ResourceType) -> String {
    let commands = rt.crud_commands();
    let width = commands
        .iter()
        .map(|c| c.command.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for cmd in commands {
        out.push_str(&format!("  {:<width$}  {}\n", cmd.command, cmd.help));
        for option in &cmd.options {
            let flag = if option.takes_value {
                format!("-o {}=<value>", option.name)
            } else {
                format!("--{}", option.name)
            };
            let default = option
                .default
                .as_deref()
                .map(|d| format!(" (default: {d})"))
                .unwrap_or_default();
            out.push_str(&format!("      {flag}  {}{default}\n", option.help));
        }
    }
    out
}

fn options_json(pairs: Vec<(String, String)>) -> serde_json::Value {
    let map = pairs
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::String(v)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

/// Check `raw` against the options the create command declares and fill in
/// defaults.
fn create_options(cmd: &CrudCommand, raw: &[String]) -> Result<serde_json::Value, CliError> {
    let pairs = parse_options(raw).map_err(CliError::Command)?;
    for (key, _) in &pairs {
        let declared = cmd
            .options
            .iter()
            .any(|o| o.takes_value && &o.name == key);
        if !declared {
            return Err(CliError::Command(format!(
                "unknown option '{key}' for '{}'",
                cmd.command
            )));
        }
    }

    let mut options = options_json(pairs);
    if let Some(map) = options.as_object_mut() {
        for option in &cmd.options {
            if let Some(default) = &option.default {
                map.entry(option.name.clone())
                    .or_insert_with(|| serde_json::Value::String(default.clone()));
            }
        }
    }
    Ok(options)
}
