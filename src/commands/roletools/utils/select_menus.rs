//! Builds role select menu components and decodes their identifiers.

use poise::serenity_prelude::{
    CreateActionRow, CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, EmojiId,
    GuildId, ReactionType, RoleId,
};

use super::settings_cache::RenderedMenu;

/// Prefix shared by every role select menu and option value.
pub const CUSTOM_ID_PREFIX: &str = "RTSelect-";

/// The `custom_id` of a menu: `RTSelect-<menu>-<guild_id>`.
pub fn menu_custom_id(menu: &str, guild_id: GuildId) -> String {
    format!("{}{}-{}", CUSTOM_ID_PREFIX, menu, guild_id)
}

/// The value of an option: `RTSelect-<option>-<role_id>`.
pub fn option_value(option: &str, role_id: RoleId) -> String {
    format!("{}{}-{}", CUSTOM_ID_PREFIX, option, role_id)
}

/// Splits `RTSelect-<name>-<id>` into its parts. Names may themselves contain dashes.
fn split_custom_id(custom_id: &str) -> Option<(&str, u64)> {
    let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?;
    let (name, id) = rest.rsplit_once('-')?;
    let id = id.parse::<u64>().ok().filter(|id| *id != 0)?;
    (!name.is_empty()).then_some((name, id))
}

pub fn parse_menu_custom_id(custom_id: &str) -> Option<(String, GuildId)> {
    split_custom_id(custom_id).map(|(name, id)| (name.to_string(), GuildId::new(id)))
}

pub fn parse_option_value(value: &str) -> Option<(String, RoleId)> {
    split_custom_id(value).map(|(name, id)| (name.to_string(), RoleId::new(id)))
}

/// Parses a stored emoji: `a:name:id` and `name:id` are custom emojis, anything else is unicode.
pub fn parse_emoji(emoji: &str) -> Option<ReactionType> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return None;
    }

    fn custom(animated: bool, name: &str, id: &str) -> Option<ReactionType> {
        id.parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(|id| ReactionType::Custom {
                animated,
                id: EmojiId::new(id),
                name: Some(name.to_string()),
            })
    }

    let parts: Vec<&str> = emoji
        .trim_start_matches('<')
        .trim_end_matches('>')
        .split(':')
        .collect();
    match parts.as_slice() {
        ["a", name, id] => custom(true, name, id),
        ["", name, id] | [name, id] => custom(false, name, id),
        _ => Some(ReactionType::Unicode(emoji.to_string())),
    }
}

/// Normalizes emoji input from a command (`<:name:id>`, `<a:name:id>` or unicode) for storage.
pub fn emoji_storage_form(emoji: &str) -> Option<String> {
    match parse_emoji(emoji)? {
        ReactionType::Custom { animated, id, name } => Some(format!(
            "{}{}:{}",
            if animated { "a:" } else { "" },
            name.unwrap_or_default(),
            id
        )),
        ReactionType::Unicode(text) => Some(text),
        _ => None,
    }
}

/// Whether `text` is made only of emoji code points, so Discord will accept it on a component.
pub fn is_unicode_emoji(text: &str) -> bool {
    let keycap = text.contains('\u{20e3}');
    let mut pictographs = 0;
    for c in text.chars() {
        match c as u32 {
            0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0x2190..=0x21FF
            | 0x2100..=0x214F
            | 0x25A0..=0x25FF
            | 0x2934
            | 0x2935
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049 => pictographs += 1,
            // Joiners, variation selectors, the keycap mark and flag tags
            0x200D | 0xFE0E | 0xFE0F | 0x20E3 | 0xE0020..=0xE007F => {}
            _ if keycap && (c.is_ascii_digit() || c == '#' || c == '*') => pictographs += 1,
            _ => return false,
        }
    }
    pictographs > 0
}

/// Storage form of an emoji a menu can show: a unicode emoji, or a custom emoji from
/// `guild_emojis`. Anything else is rejected.
pub fn usable_emoji(input: &str, guild_emojis: &[EmojiId]) -> Option<String> {
    match parse_emoji(input)? {
        ReactionType::Custom { id, .. } if !guild_emojis.contains(&id) => None,
        ReactionType::Unicode(text) if !is_unicode_emoji(&text) => None,
        _ => emoji_storage_form(input),
    }
}

fn renderable(emoji: &ReactionType) -> bool {
    match emoji {
        ReactionType::Unicode(text) => is_unicode_emoji(text),
        _ => true,
    }
}

/// Builds the component for a rendered menu. Returns `None` when no options are left to show.
pub fn build_select_menu(menu: &RenderedMenu) -> Option<CreateSelectMenu> {
    if menu.options.is_empty() {
        return None;
    }

    let options = menu
        .options
        .iter()
        .map(|option| {
            let mut builder = CreateSelectMenuOption::new(&option.label, &option.value);
            if let Some(description) = &option.description {
                builder = builder.description(description);
            }
            if let Some(emoji) = option
                .emoji
                .as_deref()
                .and_then(parse_emoji)
                .filter(renderable)
            {
                builder = builder.emoji(emoji);
            }
            builder
        })
        .collect();

    let mut builder = CreateSelectMenu::new(&menu.custom_id, CreateSelectMenuKind::String { options })
        .min_values(menu.min_values)
        .max_values(menu.max_values.max(1));
    if let Some(placeholder) = &menu.placeholder {
        builder = builder.placeholder(placeholder);
    }
    Some(builder)
}

/// One action row per menu, skipping menus that have nothing to show.
pub fn build_action_rows(menus: &[RenderedMenu]) -> Vec<CreateActionRow> {
    menus
        .iter()
        .filter_map(build_select_menu)
        .map(CreateActionRow::SelectMenu)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::roletools::utils::settings_cache::RenderedOption;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn test_custom_ids_round_trip() {
        let id = menu_custom_id("colour-picker", GuildId::new(55));
        assert_eq!(id, "RTSelect-colour-picker-55");
        assert_eq!(
            parse_menu_custom_id(&id),
            Some(("colour-picker".to_string(), GuildId::new(55)))
        );
        assert_eq!(
            parse_option_value(&option_value("vip", RoleId::new(9))),
            Some(("vip".to_string(), RoleId::new(9)))
        );
    }

    #[rstest]
    #[case("music_play_pause")]
    #[case("RTSelect-")]
    #[case("RTSelect-name-")]
    #[case("RTSelect--12")]
    #[case("RTSelect-name-0")]
    #[case("RTSelect-name-abc")]
    fn test_foreign_or_broken_ids_are_ignored(#[case] custom_id: &str) {
        assert_eq!(parse_menu_custom_id(custom_id), None);
    }

    #[rstest]
    #[case("a:party:123", true)]
    #[case("party:123", false)]
    #[case("<:party:123>", false)]
    #[case("<a:party:123>", true)]
    fn test_custom_emoji(#[case] input: &str, #[case] expected_animated: bool) {
        assert_matches!(
            parse_emoji(input),
            Some(ReactionType::Custom { animated, id, name })
                if animated == expected_animated && id.get() == 123 && name.as_deref() == Some("party")
        );
    }

    #[test]
    fn test_unicode_emoji() {
        assert_eq!(parse_emoji("🎉"), Some(ReactionType::Unicode("🎉".to_string())));
        assert_eq!(parse_emoji("  "), None);
        assert_eq!(emoji_storage_form("<a:party:123>").as_deref(), Some("a:party:123"));
        assert_eq!(emoji_storage_form("🎉").as_deref(), Some("🎉"));
    }

    #[rstest]
    #[case("🎉", true)]
    #[case("❤️", true)]
    #[case("👍🏽", true)]
    #[case("👨‍👩‍👧", true)]
    #[case("🇳🇿", true)]
    #[case("1️⃣", true)]
    #[case("™", true)]
    #[case("party", false)]
    #[case("1", false)]
    #[case("🎉 yay", false)]
    #[case(":tada:", false)]
    fn test_unicode_emoji_detection(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_unicode_emoji(input), expected);
    }

    #[test]
    fn test_only_usable_emojis_are_kept() {
        let guild_emojis = [EmojiId::new(123)];
        assert_eq!(usable_emoji("🎉", &guild_emojis).as_deref(), Some("🎉"));
        assert_eq!(
            usable_emoji("<a:party:123>", &guild_emojis).as_deref(),
            Some("a:party:123")
        );
        assert_eq!(usable_emoji("<:party:456>", &guild_emojis), None);
        assert_eq!(usable_emoji("not an emoji", &guild_emojis), None);
    }

    #[test]
    fn test_stored_text_emoji_is_left_off_the_component() {
        let menu = RenderedMenu {
            name: "tier".to_string(),
            custom_id: menu_custom_id("tier", GuildId::new(1)),
            min_values: 1,
            max_values: 1,
            placeholder: None,
            options: vec![RenderedOption {
                name: "vip".to_string(),
                value: option_value("vip", RoleId::new(2)),
                label: "VIP".to_string(),
                description: None,
                emoji: Some("vip".to_string()),
            }],
        };
        let component = serde_json::to_value(build_select_menu(&menu).unwrap()).unwrap();
        assert_eq!(component["options"][0]["label"], "VIP");
        assert!(component["options"][0]["emoji"].is_null());
    }

    #[test]
    fn test_empty_menu_is_not_rendered() {
        let menu = RenderedMenu {
            name: "tier".to_string(),
            custom_id: menu_custom_id("tier", GuildId::new(1)),
            min_values: 0,
            max_values: 0,
            placeholder: None,
            options: Vec::new(),
        };
        assert!(build_select_menu(&menu).is_none());
        assert!(build_action_rows(&[menu]).is_empty());
    }
}
