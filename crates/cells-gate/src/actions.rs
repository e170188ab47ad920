//! Rate-limited action names and their bypass capabilities.

pub const PURCHASE: &str = "purchase";
pub const MEMBER_ADD: &str = "member_add";
pub const MEMBER_REMOVE: &str = "member_remove";
pub const DOOR_INTERACT: &str = "door_interact";
pub const GUI_OPEN: &str = "gui_open";
pub const NPC_INTERACT: &str = "npc_interact";
pub const BULK_ADD: &str = "bulk_add";
pub const GROUP_EDIT: &str = "group_edit";
pub const TELEPORT: &str = "teleport";

/// Built-in ceilings, per window.
pub const DEFAULT_CEILINGS: &[(&str, u32)] = &[
    (PURCHASE, 3),
    (MEMBER_ADD, 5),
    (MEMBER_REMOVE, 5),
    (DOOR_INTERACT, 20),
    (GUI_OPEN, 10),
    (NPC_INTERACT, 10),
    (BULK_ADD, 2),
    (GROUP_EDIT, 10),
    (TELEPORT, 5),
];

/// Capability exempting an actor from one action's limit, if the action has one.
pub fn bypass_capability(action: &str) -> Option<&'static str> {
    match action {
        PURCHASE => Some("cells.bypass.ratelimit.purchase"),
        MEMBER_ADD | MEMBER_REMOVE => Some("cells.bypass.ratelimit.member"),
        DOOR_INTERACT => Some("cells.bypass.ratelimit.door"),
        GUI_OPEN => Some("cells.bypass.ratelimit.gui"),
        NPC_INTERACT => Some("cells.bypass.ratelimit.npc"),
        TELEPORT => Some("cells.bypass.ratelimit.teleport"),
        _ => None,
    }
}
