//! Parsing of the ContentDirectory `ContainerUpdateIDs` evented variable.
//!
//! The value is a comma-joined list alternating container id and update
//! counter: `id1,12,id2,7`. A payload with an odd number of tokens or an
//! unparsable counter is dropped as a whole.

/// Evented variable carrying container changes.
pub const CONTAINER_UPDATE_IDS: &str = "ContainerUpdateIDs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotification {
    pub container_id: String,
    pub update_id: u32,
}

pub fn parse_container_update_ids(raw: &str) -> Option<Vec<UpdateNotification>> {
    let tokens: Vec<&str> = raw.split(',').collect();
    if tokens.len() % 2 != 0 {
        return None;
    }

    tokens
        .chunks(2)
        .map(|pair| {
            let update_id = pair[1].trim().parse().ok()?;
            Some(UpdateNotification {
                container_id: pair[0].to_string(),
                update_id,
            })
        })
        .collect()
}

/// Ids of the changed containers, in payload order.
pub fn changed_container_ids(raw: &str) -> Option<Vec<String>> {
    parse_container_update_ids(raw)
        .map(|updates| updates.into_iter().map(|u| u.container_id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_payload_yields_even_indexed_tokens() {
        let ids = changed_container_ids("A,1,B$2,2,C,30").unwrap();
        assert_eq!(ids, vec!["A", "B$2", "C"]);

        let updates = parse_container_update_ids("64,3").unwrap();
        assert_eq!(
            updates,
            vec![UpdateNotification {
                container_id: "64".to_string(),
                update_id: 3
            }]
        );
    }

    #[test]
    fn test_odd_payload_is_dropped() {
        assert_eq!(parse_container_update_ids("A,1,B"), None);
        assert_eq!(parse_container_update_ids(""), None);
        assert_eq!(parse_container_update_ids("A"), None);
    }

    #[test]
    fn test_unparsable_counter_drops_whole_payload() {
        assert_eq!(parse_container_update_ids("A,1,B,x"), None);
        assert_eq!(parse_container_update_ids("A,-1"), None);
    }

    #[test]
    fn test_ids_are_not_interpreted() {
        // Les ids vides ou avec espaces sont transmis tels quels
        let ids = changed_container_ids(",4, spaced ,5").unwrap();
        assert_eq!(ids, vec!["", " spaced "]);
    }

    #[test]
    fn test_generated_even_lists() {
        for n in 1..20usize {
            let tokens: Vec<String> = (0..n)
                .flat_map(|i| [format!("c{i}"), i.to_string()])
                .collect();
            let ids = changed_container_ids(&tokens.join(",")).unwrap();
            let expected: Vec<String> = tokens.iter().step_by(2).cloned().collect();
            assert_eq!(ids, expected);

            let odd = tokens[..tokens.len() - 1].join(",");
            assert!(parse_container_update_ids(&odd).is_none());
        }
    }
}
