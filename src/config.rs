//! Connection configuration, deserializable from a config file and
//! bridgeable to and from a wire [`PropertyMap`](crate::property_map::PropertyMap) (§6).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::property_map::PropertyMap;

/// Which transport variant a connection is made over.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    Tcp,
    Tls,
}

impl ConnectionType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Tls => "TLS",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "TCP" => Ok(Self::Tcp),
            "TLS" => Ok(Self::Tls),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Everything a connection attempt needs: where the broker's port
/// mapper lives, which transport to lay over the mapped port, and the
/// certificate acceptance policy for `TLS`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "Config::broker_host")]
    pub broker_host: String,

    #[serde(default = "Config::broker_port")]
    pub broker_port: i32,

    #[serde(default = "Config::service_port")]
    pub service_port: i32,

    #[serde(default = "Config::connection_type")]
    pub connection_type: ConnectionType,

    #[serde(default)]
    pub enable_ipv6: bool,

    #[serde(default = "Config::read_port_mapper_timeout")]
    pub read_port_mapper_timeout: i32,

    #[serde(default = "Config::write_timeout")]
    pub write_timeout: i32,

    #[serde(default)]
    pub ssl_broker_is_trusted: bool,

    #[serde(default)]
    pub ssl_check_broker_fingerprint: bool,

    #[serde(default)]
    pub ssl_broker_cert_fingerprint: String,
}

impl Config {
    fn broker_host() -> String {
        "localhost".to_string()
    }

    fn broker_port() -> i32 {
        7676
    }

    fn service_port() -> i32 {
        0
    }

    fn connection_type() -> ConnectionType {
        ConnectionType::Tcp
    }

    fn read_port_mapper_timeout() -> i32 {
        180_000
    }

    fn write_timeout() -> i32 {
        0
    }

    /// Builds a [`Config`] from the subset of properties a client
    /// supplied explicitly, falling back to the same defaults
    /// deserialization would use for anything left unset.
    pub fn from_property_map(props: &PropertyMap) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = props.get_string_property("BrokerHost") {
            config.broker_host = host;
        }
        if let Ok(port) = props.get_i32_property("BrokerPort") {
            config.broker_port = port;
        }
        if let Ok(port) = props.get_i32_property("ServicePort") {
            config.service_port = port;
        }
        if let Ok(kind) = props.get_string_property("ConnectionType") {
            config.connection_type = ConnectionType::parse(&kind)?;
        }
        if let Ok(flag) = props.get_bool_property("EnableIPv6") {
            config.enable_ipv6 = flag;
        }
        if let Ok(timeout) = props.get_i32_property("ReadPortMapperTimeout") {
            config.read_port_mapper_timeout = timeout;
        }
        if let Ok(timeout) = props.get_i32_property("WriteTimeout") {
            config.write_timeout = timeout;
        }
        if let Ok(flag) = props.get_bool_property("SslBrokerIsTrusted") {
            config.ssl_broker_is_trusted = flag;
        }
        if let Ok(flag) = props.get_bool_property("SslCheckBrokerFingerprint") {
            config.ssl_check_broker_fingerprint = flag;
        }
        if let Ok(fingerprint) = props.get_string_property("SslBrokerCertFingerprint") {
            config.ssl_broker_cert_fingerprint = fingerprint;
        }

        Ok(config)
    }

    /// The inverse of [`Config::from_property_map`], for round-tripping
    /// a connection's effective configuration back through the wire format.
    pub fn to_property_map(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.set_string_property("BrokerHost", &self.broker_host);
        props.set_i32_property("BrokerPort", self.broker_port);
        props.set_i32_property("ServicePort", self.service_port);
        props.set_string_property("ConnectionType", self.connection_type.as_str());
        props.set_bool_property("EnableIPv6", self.enable_ipv6);
        props.set_i32_property("ReadPortMapperTimeout", self.read_port_mapper_timeout);
        props.set_i32_property("WriteTimeout", self.write_timeout);
        props.set_bool_property("SslBrokerIsTrusted", self.ssl_broker_is_trusted);
        props.set_bool_property("SslCheckBrokerFingerprint", self.ssl_check_broker_fingerprint);
        props.set_string_property("SslBrokerCertFingerprint", &self.ssl_broker_cert_fingerprint);
        props
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_host: Self::broker_host(),
            broker_port: Self::broker_port(),
            service_port: Self::service_port(),
            connection_type: Self::connection_type(),
            enable_ipv6: false,
            read_port_mapper_timeout: Self::read_port_mapper_timeout(),
            write_timeout: Self::write_timeout(),
            ssl_broker_is_trusted: false,
            ssl_check_broker_fingerprint: false,
            ssl_broker_cert_fingerprint: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_what_an_empty_property_map_would_produce() {
        let from_empty = Config::from_property_map(&PropertyMap::new()).unwrap();
        assert_eq!(from_empty.broker_host, Config::default().broker_host);
        assert_eq!(from_empty.broker_port, Config::default().broker_port);
        assert_eq!(from_empty.connection_type, ConnectionType::Tcp);
    }

    #[test]
    fn round_trips_through_a_property_map() {
        let mut config = Config::default();
        config.broker_host = "mq.example.com".to_string();
        config.broker_port = 7222;
        config.connection_type = ConnectionType::Tls;
        config.ssl_check_broker_fingerprint = true;
        config.ssl_broker_cert_fingerprint = "AB:CD:EF".to_string();

        let props = config.to_property_map();
        let restored = Config::from_property_map(&props).unwrap();

        assert_eq!(restored.broker_host, config.broker_host);
        assert_eq!(restored.broker_port, config.broker_port);
        assert_eq!(restored.connection_type, config.connection_type);
        assert_eq!(restored.ssl_check_broker_fingerprint, config.ssl_check_broker_fingerprint);
        assert_eq!(restored.ssl_broker_cert_fingerprint, config.ssl_broker_cert_fingerprint);
    }

    #[test]
    fn rejects_an_unknown_connection_type() {
        let mut props = PropertyMap::new();
        props.set_string_property("ConnectionType", "QUIC");
        assert!(matches!(Config::from_property_map(&props), Err(Error::InvalidArgument)));
    }

    #[test]
    fn deserializes_from_json5_with_partial_fields() {
        let parsed: Config = serde_json5::from_str(r#"{ "broker-host": "broker.internal", "broker-port": 7222 }"#).unwrap();
        assert_eq!(parsed.broker_host, "broker.internal");
        assert_eq!(parsed.broker_port, 7222);
        assert_eq!(parsed.service_port, Config::service_port());
        assert!(!parsed.enable_ipv6);
    }
}
