//! End-to-end scenarios exercising the public API the way a real client
//! would drive it: build a packet, send it over a transport, read it
//! back on the other end.

mod support;

use mqwire_core::error::Error;
use mqwire_core::net::ip_address::IpAddress;
use mqwire_core::net::sys_message_id::SysMessageId;
use mqwire_core::packet::Packet;
use mqwire_core::portmapper::PortMapperTable;
use mqwire_core::value::TypedValue;
use mqwire_core::PropertyMap;
use support::MemoryTransport;
use std::net::Ipv4Addr;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Invariant 1: a packet round-tripped through a transport preserves
/// its type, flags, variable headers, properties, and body.
#[test]
fn a_packet_sent_over_a_transport_arrives_intact() {
    init_logging();
    let (mut client, mut server) = MemoryTransport::pair();

    let origin = SysMessageId::generate(0, IpAddress::from_ipv4(Ipv4Addr::new(10, 0, 0, 7)), 7676);
    let mut sent = Packet::new(9, origin);
    sent.flags.set_persistent(true);
    sent.properties.set_string_property("JMSType", "greeting");
    sent.body = b"PING".to_vec();

    let bytes = sent.to_bytes().unwrap();
    mqwire_core::io::ByteWriter::write_bytes(&mut client, &bytes).unwrap();

    let received = Packet::read_from(&mut server).unwrap();

    assert_eq!(received.packet_type, 9);
    assert!(received.flags.is_persistent());
    assert_eq!(received.properties.get_string_property("JMSType").unwrap(), "greeting");
    assert_eq!(received.body, b"PING");
    assert_eq!(received.sys_message_id.ip, sent.sys_message_id.ip);
    assert_eq!(received.sys_message_id.port, sent.sys_message_id.port);
}

/// E2: a minimal packet with no variable headers and no properties
/// carries its body through unchanged.
#[test]
fn e2_minimal_packet_carries_its_body_through_unchanged() {
    let origin = SysMessageId::generate(0, IpAddress::default(), 0);
    let mut packet = Packet::new(9, origin);
    packet.body = b"PING".to_vec();

    let bytes = packet.to_bytes().unwrap();
    assert_eq!(&bytes[bytes.len() - 4..], b"PING");

    let mut reader = mqwire_core::io::SliceReader::new(&bytes);
    let read_back = Packet::read_from(&mut reader).unwrap();
    assert_eq!(read_back.packet_type, 9);
    assert!(read_back.variable_headers.is_empty());
    assert_eq!(read_back.properties.num_keys(), 0);
    assert_eq!(read_back.body, b"PING");
}

/// E3 / E4: port-mapper responses parse into lookup-able tables, or are
/// rejected outright on an unsupported version line.
#[test]
fn port_mapper_responses_parse_and_reject_as_documented() {
    let table = PortMapperTable::parse("101 brokerA 2.0\njms tcp NORMAL 7676\n.\n").unwrap();
    let jms = table.get("jms").unwrap();
    assert_eq!(jms.protocol, "tcp");
    assert_eq!(jms.service_type, "NORMAL");
    assert_eq!(jms.port, 7676);

    let without_jms = PortMapperTable::parse("101 brokerA 2.0\n.\n").unwrap();
    assert!(matches!(without_jms.get("jms"), Err(Error::NotFound)));

    assert!(matches!(PortMapperTable::parse("99 brokerA 2.0\n.\n"), Err(Error::PortMapperWrongVersion)));
}

/// E6: typed-value conversions succeed, fail, or saturate exactly as
/// documented.
#[test]
fn e6_typed_value_conversions_match_documented_outcomes() {
    let n = TypedValue::I32(3838);
    assert_eq!(n.as_string(), "3838");
    assert_eq!(n.as_i64().unwrap(), 3838);
    assert!(matches!(n.as_bool(), Err(Error::InvalidTypeConversion)));

    let truthy = TypedValue::str_auto("true");
    assert!(truthy.as_bool().unwrap());

    let huge = TypedValue::str_auto("99999999999");
    assert!(matches!(huge.as_i16(), Err(Error::TypeConversionOutOfBounds)));
}

/// Invariant 5: sequence numbers generated concurrently are pairwise
/// distinct.
#[test]
fn concurrently_generated_sequence_numbers_are_distinct() {
    use std::collections::HashSet;
    use std::thread;

    let ip = IpAddress::from_ipv4(Ipv4Addr::new(127, 0, 0, 1));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(move || (0..256).map(|_| SysMessageId::generate(0, ip, 0).sequence).collect::<Vec<_>>())
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        for seq in handle.join().unwrap() {
            assert!(all.insert(seq), "sequence {seq} was produced twice");
        }
    }
}

/// Invariant 6: an IPv4-mapped address's dotted-quad text form matches
/// the octets it was built from, and equality behaves as expected.
#[test]
fn ip_address_text_form_and_equality_are_consistent() {
    let a = IpAddress::from_ipv4(Ipv4Addr::new(192, 168, 0, 42));
    let b = IpAddress::from_ipv4(Ipv4Addr::new(192, 168, 0, 42));
    let c = IpAddress::from_ipv4(Ipv4Addr::new(192, 168, 0, 43));

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_string(), "192.168.0.42");
    assert_eq!(a.ipv4_octets().unwrap(), [192, 168, 0, 42]);
}

/// A connection's effective configuration survives a round trip through
/// the wire property-map bridge, the way a client would negotiate it.
#[test]
fn connection_configuration_round_trips_through_a_property_map() {
    use mqwire_core::config::{Config, ConnectionType};

    let mut config = Config::default();
    config.broker_host = "broker.example.com".to_string();
    config.connection_type = ConnectionType::Tls;
    config.ssl_check_broker_fingerprint = true;

    let props: PropertyMap = config.to_property_map();
    let restored = Config::from_property_map(&props).unwrap();

    assert_eq!(restored.broker_host, config.broker_host);
    assert_eq!(restored.connection_type, config.connection_type);
    assert!(restored.ssl_check_broker_fingerprint);
}

/// Invariant 2/3: a property map built from randomly generated scalar
/// and string values round-trips through both encodings element-wise.
#[test]
fn a_randomly_generated_property_map_round_trips_through_both_encodings() {
    use mqwire_core::codec::{encoding_a, encoding_b};
    use rand::Rng;

    let mut rng = rand::rng();
    let mut map = PropertyMap::new();
    for i in 0..20 {
        let key = format!("prop{i}");
        match rng.random_range(0..4) {
            0 => map.set_bool_property(key, rng.random()),
            1 => map.set_i32_property(key, rng.random()),
            2 => map.set_i64_property(key, rng.random()),
            _ => {
                let len = rng.random_range(0..32);
                let s: String = (0..len).map(|_| rng.sample(rand::distr::Alphanumeric) as char).collect();
                map.set_string_property(key, s);
            }
        }
    }

    let a_bytes = encoding_a::encode(&map).unwrap();
    assert_eq!(encoding_a::decode(&a_bytes).unwrap(), map);

    let b_bytes = encoding_b::encode(&map).unwrap();
    assert_eq!(encoding_b::decode(&b_bytes).unwrap(), map);
}
