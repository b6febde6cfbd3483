//! Parsing of the line commands typed on stdin.

use anyhow::{anyhow, bail, Context, Result};
use round_sync::UiCommand;
use rust_decimal::Decimal;
use std::str::FromStr;
use tea_core::{DecisionStepKey, Production};

pub const HELP: &str = "commands: ok | submit <product_id>:<productivity>:<price> ... | done | step <name> | refresh | quit";

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<UiCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "ok" | "ack" => UiCommand::Acknowledge,
        "done" => UiCommand::SubmitDecisions,
        "refresh" => UiCommand::Refresh,
        "quit" | "exit" => UiCommand::Shutdown,
        "step" => {
            let name = words.next().ok_or_else(|| anyhow!("usage: step <name>"))?;
            UiCommand::SelectStep(DecisionStepKey::from_str(name)?)
        }
        "submit" => {
            let productions = words.map(parse_production).collect::<Result<Vec<_>>>()?;
            if productions.is_empty() {
                bail!("usage: submit <product_id>:<productivity>:<price> ...");
            }
            UiCommand::SubmitProduction(productions)
        }
        other => bail!("unknown command `{other}`; {HELP}"),
    };
    Ok(Some(command))
}

fn parse_production(token: &str) -> Result<Production> {
    let parts: Vec<&str> = token.split(':').collect();
    let [id, productivity, price] = parts.as_slice() else {
        bail!("expected <product_id>:<productivity>:<price>, got `{token}`");
    };
    Ok(Production {
        product_id: id.parse().with_context(|| format!("bad product id in `{token}`"))?,
        productivity: productivity
            .parse()
            .with_context(|| format!("bad productivity in `{token}`"))?,
        price: Decimal::from_str(price).with_context(|| format!("bad price in `{token}`"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_verbs() {
        assert_eq!(parse_command("ok").unwrap(), Some(UiCommand::Acknowledge));
        assert_eq!(parse_command("  DONE ").unwrap(), Some(UiCommand::SubmitDecisions));
        assert_eq!(parse_command("quit").unwrap(), Some(UiCommand::Shutdown));
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn submit_lines() {
        let cmd = parse_command("submit 3:40:18.5 7:10:22").unwrap();
        assert_eq!(
            cmd,
            Some(UiCommand::SubmitProduction(vec![
                Production {
                    product_id: 3,
                    productivity: 40,
                    price: Decimal::new(185, 1),
                },
                Production {
                    product_id: 7,
                    productivity: 10,
                    price: Decimal::new(22, 0),
                },
            ]))
        );
    }

    #[test]
    fn bad_input_is_explained() {
        assert!(parse_command("submit").is_err());
        assert!(parse_command("submit 3:40").is_err());
        assert!(parse_command("submit x:40:1").is_err());
        assert!(parse_command("step bakery").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn step_by_name() {
        assert_eq!(
            parse_command("step market").unwrap(),
            Some(UiCommand::SelectStep(DecisionStepKey::Market))
        );
    }
}
