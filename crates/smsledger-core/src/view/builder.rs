//! Grouping and search over stored messages.

use std::collections::HashMap;

use super::model::SenderGroup;
use crate::message::Message;

/// Group messages by sender.
///
/// Each group's messages are sorted newest first; groups are sorted by their
/// newest message. Ties break on id and address so the output is deterministic.
#[must_use]
pub fn build(messages: impl IntoIterator<Item = Message>) -> Vec<SenderGroup> {
    let mut by_address: HashMap<String, Vec<Message>> = HashMap::new();
    for message in messages {
        by_address
            .entry(message.address.clone())
            .or_default()
            .push(message);
    }

    let mut groups: Vec<SenderGroup> = by_address
        .into_iter()
        .map(|(address, mut messages)| {
            messages.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
            SenderGroup { address, messages }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.latest_date()
            .cmp(&a.latest_date())
            .then_with(|| a.address.cmp(&b.address))
    });
    groups
}

/// Keep the groups matching a search query, preserving order.
#[must_use]
pub fn filter(groups: Vec<SenderGroup>, query: &str) -> Vec<SenderGroup> {
    if query.is_empty() {
        return groups;
    }
    groups.into_iter().filter(|g| g.matches(query)).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::message::{Classification, MessageId};

    fn message(address: &str, date: i64, body: &str) -> Message {
        Message {
            id: MessageId::derive(address, date),
            address: address.to_string(),
            body: body.to_string(),
            date,
            classification: Classification::Ham,
            read: false,
        }
    }

    #[test]
    fn test_groups_ordered_by_latest_message() {
        let groups = build(vec![
            message("X", 100, "first"),
            message("Y", 200, "other"),
            message("X", 300, "second"),
        ]);

        let addresses: Vec<_> = groups.iter().map(|g| g.address.as_str()).collect();
        assert_eq!(addresses, ["X", "Y"]);

        let x_dates: Vec<_> = groups[0].messages.iter().map(|m| m.date).collect();
        assert_eq!(x_dates, [300, 100]);
    }

    #[test]
    fn test_empty_input() {
        assert!(build(Vec::new()).is_empty());
    }

    #[test]
    fn test_display_classification_follows_latest() {
        let mut spam = message("PROMO", 200, "deal");
        spam.classification = Classification::Spam;
        let groups = build(vec![message("PROMO", 100, "hello"), spam]);

        assert_eq!(groups[0].display_classification(), Classification::Spam);
        assert_eq!(groups[0].spam_count(), 1);
        assert_eq!(groups[0].unread_count(), 2);
    }

    #[test]
    fn test_unset_displays_as_ham() {
        let mut m = message("A", 1, "x");
        m.classification = Classification::Unset;
        assert_eq!(build(vec![m])[0].display_classification(), Classification::Ham);
    }

    #[test]
    fn test_filter_matches_address_or_body() {
        let groups = build(vec![
            message("+15550001", 1, "Your OTP is 1234"),
            message("BANK", 2, "Statement ready"),
            message("Mom", 3, "call me"),
        ]);

        let by_body: Vec<_> = filter(groups.clone(), "otp")
            .into_iter()
            .map(|g| g.address)
            .collect();
        assert_eq!(by_body, ["+15550001"]);

        let by_address: Vec<_> = filter(groups.clone(), "bAnK")
            .into_iter()
            .map(|g| g.address)
            .collect();
        assert_eq!(by_address, ["BANK"]);

        assert_eq!(filter(groups.clone(), "").len(), 3);
        assert!(filter(groups, "nothing like this").is_empty());
    }

    proptest! {
        #[test]
        fn prop_build_orders_and_partitions(
            entries in prop::collection::vec((0usize..4, 0i64..1_000), 0..40)
        ) {
            let senders = ["A", "B", "C", "D"];
            let messages: Vec<_> = entries
                .iter()
                .enumerate()
                .map(|(i, (s, date))| {
                    let mut m = message(senders[*s], *date, "x");
                    m.id = MessageId::new(i.to_string());
                    m
                })
                .collect();
            let total = messages.len();

            let groups = build(messages);

            prop_assert_eq!(groups.iter().map(|g| g.messages.len()).sum::<usize>(), total);
            for pair in groups.windows(2) {
                prop_assert!(pair[0].latest_date() >= pair[1].latest_date());
                prop_assert_ne!(&pair[0].address, &pair[1].address);
            }
            for group in &groups {
                prop_assert!(!group.messages.is_empty());
                prop_assert!(group.messages.iter().all(|m| m.address == group.address));
                prop_assert!(group.messages.windows(2).all(|w| w[0].date >= w[1].date));
            }
        }
    }
}
