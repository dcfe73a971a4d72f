//! Message texts sent after a draw.

use crate::model::group::Group;
use crate::model::participant::Participant;
use crate::notify::dispatcher::OutboundMessage;

const DEFAULT_ORGANIZER_NAME: &str = "Organizer";

/// Builds participant and admin links from the public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Personal result page for one participant.
    pub fn participant_link(&self, access_code: &str) -> String {
        format!("{}/p/{}", self.base_url, access_code)
    }

    /// Organizer dashboard for one group.
    pub fn admin_link(&self, group_code: &str) -> String {
        format!("{}/admin/{}", self.base_url, group_code)
    }
}

/// Event date and suggested value lines, each ending with a newline.
fn event_details(group: &Group) -> String {
    let mut details = String::new();
    if let Some(date) = &group.event_date {
        details.push_str(&format!("📅 Exchange date: {date}\n"));
    }
    if let Some(value) = &group.suggested_value {
        details.push_str(&format!("💰 Suggested value: {value}\n"));
    }
    details
}

/// Personal invitation with the participant's private link and code.
pub fn participant_invite_text(
    group: &Group,
    participant: &Participant,
    links: &LinkBuilder,
) -> String {
    let details = event_details(group);
    format!(
        "Hi {name}! 🎄\n\n\
         You are taking part in the Secret Santa \"{group}\"!\n\n\
         {details}{spacer}\
         Open the link below to find out who you drew:\n\
         👉 {link}\n\n\
         Your access code: *{code}*\n\
         This link is personal. Do not share it with anyone! 🤫",
        name = participant.name,
        group = group.name,
        spacer = if details.is_empty() { "" } else { "\n" },
        link = links.participant_link(&participant.access_code),
        code = participant.access_code,
    )
}

/// Tells a giver that the person they drew changed their wishlist.
pub fn wishlist_update_text(
    group: &Group,
    giver: &Participant,
    receiver: &Participant,
    links: &LinkBuilder,
) -> String {
    format!(
        "🎁 Good news, {giver}!\n\n\
         {receiver} just updated their wishlist in the Secret Santa \"{group}\"!\n\n\
         Open the link to see the suggestions:\n\
         👉 {link}\n\n\
         Picking a gift just got easier! 🎄",
        giver = giver.name,
        receiver = receiver.name,
        group = group.name,
        link = links.participant_link(&giver.access_code),
    )
}

/// Summary for the organizer once the draw is committed.
pub fn organizer_summary_text(
    group: &Group,
    participant_count: usize,
    links: &LinkBuilder,
) -> String {
    let details = event_details(group);
    format!(
        "📊 {organizer}, the draw is done! 🎉\n\n\
         The Secret Santa \"{group}\" was drawn for {count} participants.\n\n\
         {details}{spacer}\
         📋 Admin dashboard:\n\
         👉 {link}\n\n\
         Group code: *{code}*\n\n\
         Use the dashboard to see who has opened their result and to resend notifications.",
        organizer = group
            .organizer_name
            .as_deref()
            .unwrap_or(DEFAULT_ORGANIZER_NAME),
        group = group.name,
        count = participant_count,
        spacer = if details.is_empty() { "" } else { "\n" },
        link = links.admin_link(&group.code),
        code = group.code,
    )
}

/// One invitation per participant that has a contact, in input order.
pub fn participant_messages(
    group: &Group,
    participants: &[Participant],
    links: &LinkBuilder,
) -> Vec<OutboundMessage> {
    participants
        .iter()
        .filter_map(|participant| {
            let address = participant.contact.as_deref()?;
            Some(OutboundMessage::new(
                address,
                participant_invite_text(group, participant, links),
            ))
        })
        .collect()
}

/// Organizer summary, or `None` when the organizer has no contact.
pub fn organizer_message(
    group: &Group,
    participant_count: usize,
    links: &LinkBuilder,
) -> Option<OutboundMessage> {
    let address = group.organizer_contact.as_deref()?;
    Some(OutboundMessage::new(
        address,
        organizer_summary_text(group, participant_count, links),
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        organizer_message, organizer_summary_text, participant_invite_text, participant_messages,
        wishlist_update_text, LinkBuilder,
    };
    use crate::model::group::{DrawState, Group};
    use crate::model::participant::Participant;
    use uuid::Uuid;

    fn group(organizer_contact: Option<&str>) -> Group {
        Group {
            id: Uuid::new_v4(),
            code: "ABC234".to_string(),
            name: "Office".to_string(),
            organizer_name: None,
            organizer_contact: organizer_contact.map(str::to_string),
            suggested_value: None,
            event_date: None,
            draw_state: DrawState::Drawn,
        }
    }

    fn participant(group: &Group, name: &str, contact: Option<&str>, code: &str) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            group_id: group.id,
            name: name.to_string(),
            contact: contact.map(str::to_string),
            access_code: code.to_string(),
            assigned_receiver_id: None,
            has_viewed_result: false,
        }
    }

    #[test]
    fn links_strip_trailing_slash() {
        let links = LinkBuilder::new("https://santa.example/");
        assert_eq!(
            links.participant_link("XYZ23456"),
            "https://santa.example/p/XYZ23456"
        );
        assert_eq!(links.admin_link("ABC234"), "https://santa.example/admin/ABC234");
    }

    #[test]
    fn participants_without_contact_are_skipped() {
        let group = group(None);
        let people = vec![
            participant(&group, "Ana", Some("27999990001"), "AAAA2222"),
            participant(&group, "Bia", None, "BBBB3333"),
        ];
        let links = LinkBuilder::new("https://santa.example");
        let messages = participant_messages(&group, &people, &links);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].address, "27999990001");
        assert!(messages[0].text.contains("Ana"));
        assert!(messages[0].text.contains("https://santa.example/p/AAAA2222"));
    }

    #[test]
    fn organizer_message_requires_contact_and_uses_fallback_name() {
        let links = LinkBuilder::new("https://santa.example");
        assert!(organizer_message(&group(None), 3, &links).is_none());

        let message = organizer_message(&group(Some("27999990009")), 3, &links).unwrap();
        assert!(message.text.starts_with("📊 Organizer"));
        assert!(message.text.contains("https://santa.example/admin/ABC234"));
    }

    #[test]
    fn event_details_appear_only_when_set() {
        let links = LinkBuilder::new("https://santa.example");
        let mut group = group(Some("27999990009"));
        let ana = participant(&group, "Ana", Some("27999990001"), "AAAA2222");

        let plain = participant_invite_text(&group, &ana, &links);
        assert!(!plain.contains("Exchange date"));
        assert!(!plain.contains("Suggested value"));

        group.event_date = Some("2026-12-20".to_string());
        group.suggested_value = Some("50".to_string());
        let invite = participant_invite_text(&group, &ana, &links);
        assert!(invite.contains("📅 Exchange date: 2026-12-20"));
        assert!(invite.contains("💰 Suggested value: 50"));
        let summary = organizer_summary_text(&group, 3, &links);
        assert!(summary.contains("📅 Exchange date: 2026-12-20"));
    }

    #[test]
    fn wishlist_update_links_to_giver_page() {
        let links = LinkBuilder::new("https://santa.example");
        let group = group(None);
        let giver = participant(&group, "Ana", Some("27999990001"), "AAAA2222");
        let receiver = participant(&group, "Bia", None, "BBBB3333");

        let text = wishlist_update_text(&group, &giver, &receiver, &links);
        assert!(text.starts_with("🎁 Good news, Ana!"));
        assert!(text.contains("Bia just updated their wishlist"));
        assert!(text.contains("https://santa.example/p/AAAA2222"));
        assert!(!text.contains("BBBB3333"));
    }
}
