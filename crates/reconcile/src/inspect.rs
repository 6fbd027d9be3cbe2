//! Inspector - reads live access configuration from a session

use crate::dialect::Dialect;
use crate::error::ReadFailure;
use crate::parser::FactParser;
use crate::types::ObservedState;
use devicekit::Session;

/// Read principals and secrets from the target behind `session`.
///
/// Both reads go through the same session. Either read failing fails the
/// whole observation; no partial state is returned.
pub fn observe(
    session: &mut dyn Session,
    dialect: &Dialect,
    parser: &FactParser,
) -> Result<ObservedState, ReadFailure> {
    let principals = read(session, &dialect.principal_listing)
        .map(|raw| parser.parse_principals(&raw))?;
    log::debug!("Observed {} principal(s)", principals.len());

    let secrets = observe_secrets(session, &dialect.secret_listing, parser)?;
    log::debug!("Observed {} secret(s)", secrets.len());

    Ok(ObservedState::new(principals, secrets))
}

/// Structured records first, then line-based extraction.
fn observe_secrets(
    session: &mut dyn Session,
    command: &str,
    parser: &FactParser,
) -> Result<Vec<String>, ReadFailure> {
    let records = session
        .run_structured(command)
        .map_err(|source| ReadFailure {
            command: command.to_string(),
            source,
        })?;

    if let Some(records) = records {
        let secrets = parser.parse_secret_records(&records);
        if !secrets.is_empty() {
            return Ok(secrets);
        }
        log::debug!("No usable secret fields in structured output, falling back to text");
    }

    read(session, command).map(|raw| parser.parse_secrets(&raw))
}

fn read(session: &mut dyn Session, command: &str) -> Result<String, ReadFailure> {
    log::debug!("Reading: {command}");
    session.run_read(command).map_err(|source| ReadFailure {
        command: command.to_string(),
        source,
    })
}
