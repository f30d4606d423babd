use shared::domain::Point;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Click(Point),
    Search(String),
    Clear,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "commands: start | click <lat> <lng> | search <query> | clear | show | help | quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));

    match verb.to_ascii_lowercase().as_str() {
        "start" | "add" => Ok(Command::Start),
        "clear" => Ok(Command::Clear),
        "show" => Ok(Command::Show),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "search" if !rest.is_empty() => Ok(Command::Search(rest.to_string())),
        "search" => Err("search needs a query".to_string()),
        "click" => {
            let mut parts = rest.split(|c: char| c == ',' || c.is_whitespace());
            let mut next = || {
                parts
                    .by_ref()
                    .find(|part| !part.is_empty())
                    .ok_or_else(|| "click needs <lat> <lng>".to_string())
                    .and_then(|part| {
                        part.parse::<f64>()
                            .map_err(|_| format!("'{part}' is not a number"))
                    })
            };
            let lat = next()?;
            let lng = next()?;
            Ok(Command::Click(Point::new(lat, lng)))
        }
        "" => Err(HELP.to_string()),
        other => Err(format!("unknown command '{other}'; {HELP}")),
    }
}
