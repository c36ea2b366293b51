use anyhow::{anyhow, bail, Context, Result};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use site_query::{
    outline, AppConfig, Combinator, CompilerConfig, NodeId, Operator, QueryBuilder, SqlCompiler,
    TreeEvent,
};

const DEFAULT_CONFIG: &str = "config.json";

const HELP: &str = "\
commands:
  show                     print the tree
  sites                    list sites and their fields
  rule <group>             add a rule (a site rule under #0)
  group <node>             add a group
  rm <node>                remove a node and everything below it
  field <rule> <key>       select a field
  op <rule> <operator>     equals | contains | regex | regex_case_insensitive
  value <rule> <text>      set the value of a rule
  site <site-rule> <site>  select the site of a site rule
  cond <group> AND|OR      set a group's condition
  query                    print the query document
  view                     print the renderable view as JSON
  sql                      compile the query to SQL
  load <json> | load @<file>
  reset                    remove every site rule
  quit";

/// 终端命令
#[derive(Debug)]
enum Command {
    Help,
    Show,
    Sites,
    AddRule(NodeId),
    AddGroup(NodeId),
    Remove(NodeId),
    Field(NodeId, String),
    Operator(NodeId, Operator),
    Value(NodeId, String),
    Site(NodeId, String),
    Condition(NodeId, Combinator),
    Query,
    View,
    Sql,
    Load(String),
    Reset,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match name {
            "" => return Ok(None),
            "help" | "?" => Command::Help,
            "show" => Command::Show,
            "sites" => Command::Sites,
            "rule" => Command::AddRule(node_arg(rest)?),
            "group" => Command::AddGroup(node_arg(rest)?),
            "rm" => Command::Remove(node_arg(rest)?),
            "field" => {
                let (id, key) = node_and_text(rest)?;
                Command::Field(id, key)
            }
            "op" => {
                let (id, op) = node_and_text(rest)?;
                Command::Operator(id, op.parse()?)
            }
            "value" => {
                let (id, value) = node_and_text(rest).or_else(|_| node_arg(rest).map(|id| (id, String::new())))?;
                Command::Value(id, value)
            }
            "site" => {
                let (id, site) = node_and_text(rest)?;
                Command::Site(id, site)
            }
            "cond" => {
                let (id, condition) = node_and_text(rest)?;
                Command::Condition(id, condition.to_uppercase().parse()?)
            }
            "query" => Command::Query,
            "view" => Command::View,
            "sql" => Command::Sql,
            "load" if !rest.is_empty() => Command::Load(rest.to_string()),
            "reset" => Command::Reset,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command `{}`, try `help`", other),
        };
        Ok(Some(command))
    }
}

fn node_arg(text: &str) -> Result<NodeId> {
    text.parse()
        .map_err(|_| anyhow!("expected a node id such as #3, found `{}`", text))
}

fn node_and_text(text: &str) -> Result<(NodeId, String)> {
    let (id, rest) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("expected a node id followed by an argument"))?;
    Ok((node_arg(id)?, rest.trim().to_string()))
}

/// 加载配置，失败时使用内置演示配置
fn load_config(path: &str) -> AppConfig {
    match AppConfig::from_json_file(path) {
        Ok(config) => {
            println!("✅ 使用JSON配置文件: {}", path);
            println!("✅ 加载了 {} 个站点", config.sites.len());
            config
        }
        Err(e) => {
            println!("⚠️ 无法加载JSON配置文件 ({}), 使用默认配置", e);
            AppConfig::demo()
        }
    }
}

struct Session {
    builder: QueryBuilder,
    compiler: SqlCompiler,
}

impl Session {
    /// Run one command. `Ok(None)` ends the session.
    fn handle(&mut self, command: Command) -> Result<Option<String>> {
        let output = match command {
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(None),
            Command::Show => outline(&self.builder.view()?),
            Command::Sites => {
                let tree = self.builder.tree()?;
                let mut out = String::new();
                for (id, source) in tree.schema().sources() {
                    let fields: Vec<&str> = source.keys.keys().map(String::as_str).collect();
                    out.push_str(&format!("{} ({}): {}\n", id, source.name, fields.join(", ")));
                }
                out
            }
            Command::AddRule(id) => {
                let rule = self.builder.tree_mut()?.add_rule(id)?;
                format!("added rule {}", rule)
            }
            Command::AddGroup(id) => match self.builder.tree_mut()?.add_group(id)? {
                Some(group) => format!("added group {}", group),
                None => format!("{} already has a group", id),
            },
            Command::Remove(id) => {
                self.builder.tree_mut()?.remove(id)?;
                format!("removed {}", id)
            }
            Command::Field(id, key) => {
                self.builder.tree_mut()?.set_field(id, &key)?;
                self.describe_changes()?
            }
            Command::Operator(id, op) => {
                self.builder.tree_mut()?.set_operator(id, op)?;
                self.describe_changes()?
            }
            Command::Value(id, value) => {
                self.builder.tree_mut()?.set_value(id, value)?;
                self.describe_changes()?
            }
            Command::Site(id, site) => {
                self.builder.tree_mut()?.set_source(id, &site)?;
                self.describe_changes()?
            }
            Command::Condition(id, condition) => {
                self.builder.tree_mut()?.set_condition(id, condition)?;
                self.describe_changes()?
            }
            Command::Query => self.builder.query()?.to_json_pretty()?,
            Command::View => serde_json::to_string_pretty(&self.builder.view()?)?,
            Command::Sql => self.compiler.compile(&self.builder.query()?)?.sql,
            Command::Load(source) => {
                let text = match source.strip_prefix('@') {
                    Some(path) => std::fs::read_to_string(path)
                        .with_context(|| format!("无法读取查询文件 {}", path))?,
                    None => source,
                };
                self.builder.load_json(&text)?;
                outline(&self.builder.view()?)
            }
            Command::Reset => {
                self.builder.reset()?;
                "tree reset".to_string()
            }
        };
        self.builder.tree_mut()?.drain_events();
        Ok(Some(output))
    }

    /// Summarise pending change notifications
    fn describe_changes(&mut self) -> Result<String> {
        let changed: Vec<String> = self
            .builder
            .tree_mut()?
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                TreeEvent::Changed { id } => Some(id.to_string()),
                _ => None,
            })
            .collect();
        Ok(if changed.is_empty() {
            "no change".to_string()
        } else {
            format!("updated {}", changed.join(", "))
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    println!("--- Site Query Builder ---");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = load_config(&config_path);

    let builder = QueryBuilder::with_schema(config.schema()?);
    let compiler = SqlCompiler::from_config(
        Arc::clone(builder.tree()?.schema()),
        CompilerConfig::from(&config),
    );
    let mut session = Session { builder, compiler };

    println!("type `help` for commands\n");
    print!("{}", outline(&session.builder.view()?));

    let mut editor = DefaultEditor::new()?;
    loop {
        let readline = editor.readline("> ");
        match readline {
            Ok(line) => {
                editor.add_history_entry(line.as_str())?;

                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("Error: {}", e);
                        continue;
                    }
                };
                match session.handle(command) {
                    Ok(Some(output)) => println!("{}", output.trim_end()),
                    Ok(None) => break,
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let config = AppConfig::demo();
        let builder = QueryBuilder::with_schema(config.schema().unwrap());
        let compiler = SqlCompiler::from_config(
            Arc::clone(builder.tree().unwrap().schema()),
            CompilerConfig::from(&config),
        );
        Session { builder, compiler }
    }

    fn run(session: &mut Session, line: &str) -> String {
        let command = Command::parse(line).unwrap().unwrap();
        session.handle(command).unwrap().unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(Command::parse("  ").unwrap(), None));
        assert!(matches!(
            Command::parse("op #3 regex").unwrap(),
            Some(Command::Operator(id, Operator::Regex)) if id == NodeId::new(3)
        ));
        assert!(matches!(
            Command::parse("cond 2 or").unwrap(),
            Some(Command::Condition(_, Combinator::Or))
        ));
        assert!(matches!(
            Command::parse("value #4 hello world").unwrap(),
            Some(Command::Value(_, v)) if v == "hello world"
        ));
        assert!(matches!(Command::parse("value #4").unwrap(), Some(Command::Value(_, v)) if v.is_empty()));
        assert!(Command::parse("op #3 starts_with").is_err());
        assert!(Command::parse("rule abc").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }

    #[test]
    fn test_session_builds_and_compiles() {
        let mut session = session();
        assert_eq!(run(&mut session, "rule #0"), "added rule #1");
        assert_eq!(run(&mut session, "site #1 hacker_news"), "updated #1");
        assert_eq!(run(&mut session, "group #1"), "added group #2");
        assert_eq!(run(&mut session, "group #1"), "#1 already has a group");
        assert_eq!(run(&mut session, "rule #2"), "added rule #3");
        run(&mut session, "field #3 title");
        run(&mut session, "op #3 contains");
        run(&mut session, "value #3 rust");

        let sql = run(&mut session, "sql");
        assert!(sql.contains(r#"FROM "hacker_news""#));
        assert!(sql.contains(r#""title" LIKE '%rust%'"#));

        let query = run(&mut session, "query");
        let mut other = self::session();
        run(&mut other, &format!("load {}", query.replace('\n', " ")));
        assert_eq!(run(&mut other, "query"), query);
    }
}
