use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chainkit", version, about = "Create and run local chain resources")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Plugin that provides the resource kind, when more than one does.
    #[arg(long, global = true)]
    pub plugin: Option<String>,

    /// Keep the subtasks of finished tasks in the printed task tree.
    #[arg(long, global = true)]
    pub expand: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CreateArgs {
    pub kind: String,

    pub name: String,

    /// Extra positional arguments declared by the resource kind.
    pub args: Vec<String>,

    /// Start the resource once it is created.
    #[arg(long)]
    pub start: bool,

    /// Kind-specific option (KEY=VALUE). Can be specified multiple times.
    #[arg(long = "option", short = 'o', action = clap::ArgAction::Append)]
    pub options: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TargetArgs {
    pub kind: String,

    pub name: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GetArgs {
    pub kind: String,

    /// Keep printing the list as it changes, until interrupted.
    #[arg(long)]
    pub watch: bool,

    /// Filter option (KEY=VALUE), e.g. `state=started`.
    #[arg(long = "option", short = 'o', action = clap::ArgAction::Append)]
    pub options: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ResetArgs {
    /// Confirm that every resource should be forgotten.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Create(CreateArgs),
    #[command(alias = "rm")]
    Delete(TargetArgs),
    #[command(alias = "up")]
    Start(TargetArgs),
    #[command(alias = "down")]
    Stop(TargetArgs),
    #[command(visible_alias = "ls", alias = "list")]
    Get(GetArgs),
    #[command(alias = "show")]
    Describe(TargetArgs),
    /// List loaded plugins and the commands of their resource kinds.
    Plugins,
    /// Forget every resource and wipe plugin data.
    Reset(ResetArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Delete(_) => "delete",
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Get(_) => "get",
            Self::Describe(_) => "describe",
            Self::Plugins => "plugins",
            Self::Reset(_) => "reset",
        }
    }
}

/// Split `KEY=VALUE` pairs. A bare `KEY` means `KEY=true`.
pub fn parse_options(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|item| {
            let (key, value) = match item.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (item.trim(), "true"),
            };
            if key.is_empty() {
                return Err(format!("invalid option '{item}', expected KEY=VALUE"));
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_create_with_options() {
        let args = Args::try_parse_from([
            "chainkit",
            "create",
            "network",
            "local",
            "31337",
            "--start",
            "-o",
            "block-time=5",
        ])
        .unwrap();

        let Commands::Create(create) = args.command else {
            panic!("expected create");
        };
        assert_eq!(create.kind, "network");
        assert_eq!(create.name, "local");
        assert_eq!(create.args, vec!["31337"]);
        assert!(create.start);
        assert_eq!(create.options, vec!["block-time=5"]);
    }

    #[test]
    fn test_aliases() {
        let args = Args::try_parse_from(["chainkit", "ls", "network", "--watch"]).unwrap();
        assert!(matches!(args.command, Commands::Get(GetArgs { watch: true, .. })));

        let args = Args::try_parse_from(["chainkit", "down", "network", "local"]).unwrap();
        assert_eq!(args.command.name(), "stop");
    }

    #[test]
    fn test_parse_options() {
        let parsed = parse_options(&["a=1".to_string(), "flag".to_string()]).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("a".to_string(), "1".to_string()),
                ("flag".to_string(), "true".to_string())
            ]
        );
        assert!(parse_options(&["=x".to_string()]).is_err());
    }
}
