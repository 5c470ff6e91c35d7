#[cfg(test)]
mod tests_impl {
    use crate::core::arista::Arista;
    use crate::core::error::{Error, NameKind};
    use crate::core::generator::{Generator, RenderOptions};
    use crate::core::openconfig::OpenConfig;
    use crate::core::policy::{Header, Target};
    use crate::core::test_helpers::{FakeNaming, TEST_IPS, filter, policy, term};
    use chrono::NaiveDate;

    #[test]
    fn test_build_tokens_symmetric_across_renders() {
        let arista = Arista::new();
        let before = arista.build_tokens();
        let mut t = term("good-term-1");
        t.protocol = vec!["tcp".to_string()];
        t.option = vec!["tcp-established".to_string()];
        t.policer = Some("batman".to_string());
        let pol = policy(vec![filter("arista", &["f"], &[], vec![t])]);
        arista.render(&pol, &FakeNaming::new()).unwrap();

        assert_eq!(arista.build_tokens(), before);
        let (tokens, sub_tokens) = before;
        assert_eq!(tokens.len(), 24);
        assert!(!tokens.contains("policer"));
        assert_eq!(sub_tokens["icmp_type"].len(), 42);
        assert_eq!(sub_tokens["action"].len(), 5);

        let (tokens, sub_tokens) = OpenConfig::new().build_tokens();
        assert_eq!(tokens.len(), 16);
        assert!(!tokens.contains("logging"));
        assert_eq!(sub_tokens.len(), 2);
    }

    #[test]
    fn test_header_for_both_platforms() {
        let naming = FakeNaming::new().with_address("CORP_EXTERNAL", TEST_IPS);
        let mut t = term("both");
        t.destination_address = vec!["CORP_EXTERNAL".to_string()];
        let mut f = filter("arista", &["edge", "mixed"], &["shared"], vec![t]);
        f.header.targets.push(Target {
            platform: "openconfig".to_string(),
            options: vec!["edge".to_string()],
        });
        let pol = policy(vec![f]);

        let eos = Arista::new().render(&pol, &naming).unwrap();
        let oc = OpenConfig::new().render(&pol, &naming).unwrap();
        assert_eq!(eos.filters.len(), 2);
        assert_eq!(oc.acl_sets[0].acl_entries.entries.len(), 2);
    }

    #[test]
    fn test_filters_for_other_platforms_are_ignored() {
        let pol = policy(vec![
            filter("juniper", &["other"], &[], vec![term("t")]),
            filter("openconfig", &["mine"], &[], vec![term("t")]),
        ]);
        let oc = OpenConfig::new().render(&pol, &FakeNaming::new()).unwrap();
        assert_eq!(oc.acl_sets.len(), 1);
        assert_eq!(oc.acl_sets[0].name, "mine");
        assert!(Arista::new().render(&pol, &FakeNaming::new()).unwrap().filters.is_empty());
    }

    #[test]
    fn test_unresolved_name_aborts_whole_render() {
        let naming = FakeNaming::new().with_address("KNOWN", &["10.0.0.0/8"]);
        let mut good = term("good");
        good.source_address = vec!["KNOWN".to_string()];
        let mut bad = term("bad");
        bad.source_address = vec!["UNKNOWN".to_string()];
        let pol = policy(vec![
            filter("arista", &["first"], &[], vec![good]),
            filter("arista", &["second"], &[], vec![bad]),
        ]);

        let err = Arista::new().render(&pol, &naming).unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedName { kind: NameKind::Address, ref name } if name == "UNKNOWN"
        ));
    }

    #[test]
    fn test_unsupported_token_aborts() {
        let mut t = term("t");
        t.qos = Some("af4".to_string());
        let pol = policy(vec![filter("openconfig", &["f"], &[], vec![t])]);
        assert!(matches!(
            OpenConfig::new().render(&pol, &FakeNaming::new()),
            Err(Error::UnsupportedToken { .. })
        ));
    }

    #[test]
    fn test_expired_terms_are_skipped_by_both_backends() {
        let options = RenderOptions {
            exp_info_weeks: 2,
            today: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        let mut expired = term("expired");
        expired.expiration = NaiveDate::from_ymd_opt(2020, 1, 1);
        let mut soon = term("soon");
        soon.expiration = NaiveDate::from_ymd_opt(2024, 6, 10);

        let mut pol = policy(vec![filter("arista", &["f"], &[], vec![expired, soon])]);
        pol.filters[0].header.targets.push(Target {
            platform: "openconfig".to_string(),
            options: vec!["f".to_string(), "inet".to_string()],
        });

        let eos = Arista::new().render_with(&pol, &FakeNaming::new(), &options).unwrap();
        assert!(!eos.to_string().contains("expired"));
        assert!(eos.to_string().contains("remark soon"));

        let oc = OpenConfig::new().render_with(&pol, &FakeNaming::new(), &options).unwrap();
        assert_eq!(oc.acl_sets[0].acl_entries.entries.len(), 1);
    }

    #[test]
    fn test_missing_filter_name_is_rejected() {
        let pol = policy(vec![crate::core::policy::Filter {
            header: Header {
                targets: vec![Target {
                    platform: "arista".to_string(),
                    options: vec![],
                }],
                comment: vec![],
            },
            terms: vec![term("t")],
        }]);
        assert!(matches!(
            Arista::new().render(&pol, &FakeNaming::new()),
            Err(Error::InvalidFilterName { .. })
        ));
    }

    #[test]
    fn test_two_filter_types_are_rejected() {
        let pol = policy(vec![filter("arista", &["f", "inet", "inet6"], &[], vec![])]);
        assert!(matches!(
            Arista::new().render(&pol, &FakeNaming::new()),
            Err(Error::UnsupportedFilterType { ref filter_type, .. }) if filter_type == "inet6"
        ));
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::arista::Arista;
    use crate::core::error::Error;
    use crate::core::generator::Generator;
    use crate::core::openconfig::OpenConfig;
    use crate::core::policy::Term;
    use crate::core::protocols::protocol_number;
    use crate::core::test_helpers::{FakeNaming, TEST_IPS, filter, policy, term};
    use proptest::prelude::*;

    const PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "esp", "ah", "gre", "ospf", "pim"];

    fn naming() -> FakeNaming {
        FakeNaming::new()
            .with_address("CORP_EXTERNAL", TEST_IPS)
            .with_address("RFC1918", &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"])
            .with_service("DNS", &["53"])
            .with_service("HIGH_PORTS", &["1024-65535"])
    }

    prop_compose! {
        fn arb_protocols()(protocols in proptest::sample::subsequence(PROTOCOLS, 0..4)) -> Vec<String> {
            protocols.into_iter().map(ToString::to_string).collect()
        }
    }

    prop_compose! {
        fn arb_term()(
            name in "[a-z][a-z0-9-]{0,20}",
            protocols in arb_protocols(),
            source in proptest::option::of(prop_oneof![Just("CORP_EXTERNAL"), Just("RFC1918")]),
            destination in proptest::option::of(prop_oneof![Just("CORP_EXTERNAL"), Just("RFC1918")]),
            with_ports in any::<bool>(),
        ) -> Term {
            let mut t = term(&name);
            let has_port_protocol = protocols.iter().any(|p| p == "tcp" || p == "udp");
            t.protocol = protocols;
            t.source_address = source.into_iter().map(ToString::to_string).collect();
            t.destination_address = destination.into_iter().map(ToString::to_string).collect();
            if with_ports && has_port_protocol {
                t.destination_port = vec!["DNS".to_string()];
                t.source_port = vec!["HIGH_PORTS".to_string()];
            }
            t
        }
    }

    proptest! {
        #[test]
        fn test_protocol_numbers_are_stable(index in 0..PROTOCOLS.len()) {
            let name = PROTOCOLS[index];
            let first = protocol_number(name);
            prop_assert!(first.is_some());
            prop_assert_eq!(first, protocol_number(name));
        }

        #[test]
        fn test_rendering_is_idempotent(terms in prop::collection::vec(arb_term(), 1..6)) {
            let mut pol = policy(vec![filter("arista", &["f", "mixed"], &["c"], terms)]);
            pol.filters[0].header.targets.push(crate::core::policy::Target {
                platform: "openconfig".to_string(),
                options: vec!["f".to_string()],
            });
            let naming = naming();

            let eos_a = Arista::new().render(&pol, &naming).unwrap().to_string();
            let eos_b = Arista::new().render(&pol, &naming).unwrap().to_string();
            prop_assert_eq!(eos_a, eos_b);

            let oc_a = OpenConfig::new().render(&pol, &naming).unwrap().to_string();
            let oc_b = OpenConfig::new().render(&pol, &naming).unwrap().to_string();
            prop_assert_eq!(oc_a, oc_b);
        }

        #[test]
        fn test_sequence_ids_strictly_increase(terms in prop::collection::vec(arb_term(), 1..6)) {
            let pol = policy(vec![filter("openconfig", &["f", "mixed"], &[], terms)]);
            let acl = OpenConfig::new().render(&pol, &naming()).unwrap();
            let ids: Vec<u32> = acl.acl_sets[0]
                .acl_entries
                .entries
                .iter()
                .map(|entry| entry.sequence_id)
                .collect();
            if let Some(first) = ids.first() {
                prop_assert_eq!(*first, 5);
            }
            prop_assert!(ids.windows(2).all(|pair| pair[1] == pair[0] + 5));
        }

        #[test]
        fn test_tcp_established_accepts_only_tcp(protocols in arb_protocols()) {
            let mut t = term("est");
            t.option = vec!["tcp-established".to_string()];
            t.protocol = protocols.clone();
            let pol = policy(vec![filter("openconfig", &["f", "inet"], &[], vec![t])]);
            let result = OpenConfig::new().render(&pol, &naming());

            if !protocols.is_empty() && protocols.iter().all(|p| p == "tcp") {
                let json = result.unwrap().to_string();
                prop_assert!(json.contains("TCP_ESTABLISHED"));
            } else {
                let is_tcp_established_error =
                    matches!(result, Err(Error::TcpEstablishedWithNonTcp { .. }));
                prop_assert!(is_tcp_established_error);
            }
        }
    }
}
