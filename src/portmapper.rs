//! Port-mapper response parser and service table (§4.7).
//!
//! A broker's port-mapper service answers a bare TCP connection with a
//! newline-separated, space-separated text block advertising the ports
//! of its other services. This module parses that block and looks up
//! the (protocol, service type) pair a caller needs to dial next.

use crate::error::{Error, Result};

const VERSION: &str = "101";
const SERVICE_TERMINATOR: &str = ".";
const SERVICE_LINE_MIN_FIELDS: usize = 4;

/// One advertised service: its name, transport protocol, service type,
/// and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapperEntry {
    pub name: String,
    pub protocol: String,
    pub service_type: String,
    pub port: u16,
}

/// The parsed port-mapper response: the broker's own version/instance
/// fields plus every advertised service, in the order they appeared.
#[derive(Debug, Clone, Default)]
pub struct PortMapperTable {
    pub broker_version: String,
    pub broker_instance: String,
    pub packet_version: String,
    entries: Vec<PortMapperEntry>,
}

impl PortMapperTable {
    /// Parses a complete port-mapper response, per §4.7's grammar.
    ///
    /// The version line's first field must equal [`VERSION`]
    /// ("101") or this returns `PortMapperWrongVersion`. Service lines
    /// with fewer than 4 whitespace-separated fields, or a non-numeric
    /// or out-of-range port, return `PortMapperInvalidInput`. Parsing
    /// stops at the `.` terminator line; anything after it is ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.split('\n').filter(|l| !l.is_empty());

        let version_line = lines.next().ok_or(Error::PortMapperInvalidInput)?;
        let mut version_fields = version_line.split(' ').filter(|f| !f.is_empty());
        let portmapper_version = version_fields.next().ok_or(Error::PortMapperInvalidInput)?;
        let broker_instance = version_fields.next().ok_or(Error::PortMapperInvalidInput)?;
        let packet_version = version_fields.next().ok_or(Error::PortMapperInvalidInput)?;

        if portmapper_version != VERSION {
            return Err(Error::PortMapperWrongVersion);
        }

        let mut table = Self {
            broker_version: portmapper_version.to_string(),
            broker_instance: broker_instance.to_string(),
            packet_version: packet_version.to_string(),
            entries: Vec::new(),
        };

        for line in lines {
            if line == SERVICE_TERMINATOR {
                break;
            }

            table.entries.push(parse_service_line(line)?);
        }

        Ok(table)
    }

    pub fn get(&self, name: &str) -> Result<&PortMapperEntry> {
        self.entries.iter().find(|e| e.name == name).ok_or(Error::NotFound)
    }

    /// Finds the first entry matching a (protocol, type) pair, e.g.
    /// `("tcp", "NORMAL")` for JMS or `("tls", "NORMAL")` for secure JMS.
    pub fn get_port_for_protocol(&self, protocol: &str, service_type: &str) -> Result<&PortMapperEntry> {
        self.entries.iter().find(|e| e.protocol == protocol && e.service_type == service_type).ok_or(Error::NotFound)
    }

    pub fn entries(&self) -> &[PortMapperEntry] {
        &self.entries
    }
}

fn parse_service_line(line: &str) -> Result<PortMapperEntry> {
    let mut fields = line.split(' ').filter(|f| !f.is_empty());
    let name = fields.next().ok_or(Error::PortMapperInvalidInput)?;
    let protocol = fields.next().ok_or(Error::PortMapperInvalidInput)?;
    let service_type = fields.next().ok_or(Error::PortMapperInvalidInput)?;
    let port_str = fields.next().ok_or(Error::PortMapperInvalidInput)?;

    // Every field so far plus anything still left (an optional bracketed
    // property blob) must total at least the minimum; extras are ignored.
    let seen = 4 + fields.count();
    if seen < SERVICE_LINE_MIN_FIELDS {
        return Err(Error::PortMapperInvalidInput);
    }

    let port: u16 = port_str.parse().map_err(|_| Error::PortMapperInvalidInput)?;

    Ok(PortMapperEntry { name: name.to_string(), protocol: protocol.to_string(), service_type: service_type.to_string(), port })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "101 jmqbroker 2.0\ncluster tcp CLUSTER 59135\nadmin tcp ADMIN 59134\nportmapper tcp PORTMAPPER 7676\njms tcp NORMAL 59133\nhttpjms http NORMAL 0\n.\n";

    /// Matches E3: a minimal response with one service line.
    #[test]
    fn e3_parses_a_minimal_response_and_looks_up_jms() {
        let table = PortMapperTable::parse("101 brokerA 2.0\njms tcp NORMAL 7676\n.\n").unwrap();
        let entry = table.get("jms").unwrap();
        assert_eq!(entry.protocol, "tcp");
        assert_eq!(entry.service_type, "NORMAL");
        assert_eq!(entry.port, 7676);
    }

    /// Matches E4: a response with no matching service is NotFound; a
    /// version mismatch is PortMapperWrongVersion.
    #[test]
    fn e4_missing_service_is_not_found_and_bad_version_is_rejected() {
        let table = PortMapperTable::parse("101 brokerA 2.0\n.\n").unwrap();
        assert!(matches!(table.get("jms"), Err(Error::NotFound)));

        assert!(matches!(PortMapperTable::parse("99 brokerA 2.0\n.\n"), Err(Error::PortMapperWrongVersion)));
    }

    #[test]
    fn parses_every_entry_in_a_realistic_response() {
        let table = PortMapperTable::parse(SAMPLE).unwrap();
        assert_eq!(table.entries().len(), 5);
        assert_eq!(table.get_port_for_protocol("tcp", "NORMAL").unwrap().name, "jms");
        assert_eq!(table.get("httpjms").unwrap().port, 0);
    }

    #[test]
    fn extra_bracketed_fields_on_a_service_line_are_ignored() {
        let table = PortMapperTable::parse("101 brokerA 2.0\njms tcp NORMAL 7676 [foo=bar]\n.\n").unwrap();
        assert_eq!(table.get("jms").unwrap().port, 7676);
    }

    #[test]
    fn rejects_a_service_line_with_too_few_fields() {
        assert!(matches!(
            PortMapperTable::parse("101 brokerA 2.0\njms tcp\n.\n"),
            Err(Error::PortMapperInvalidInput)
        ));
    }

    #[test]
    fn rejects_a_non_numeric_port() {
        assert!(matches!(
            PortMapperTable::parse("101 brokerA 2.0\njms tcp NORMAL abc\n.\n"),
            Err(Error::PortMapperInvalidInput)
        ));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(PortMapperTable::parse(""), Err(Error::PortMapperInvalidInput)));
    }
}
