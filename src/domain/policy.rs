//! Access rules for chat threads.
//!
//! The policy is an ordered chain of rules. Each rule either decides
//! ([`Decision::Allow`] / [`Decision::Deny`]) or abstains; the first decisive
//! rule wins and a chain where every rule abstains denies.

use crate::config::ChatFlags;
use crate::domain::chat::ChatThread;
use crate::domain::user::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    View,
    Post,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Abstain,
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    pub actor: &'a Actor,
    pub thread: &'a ChatThread,
    pub action: ChatAction,
    pub flags: ChatFlags,
}

pub type Rule = fn(&PolicyContext<'_>) -> Decision;

fn admin_override(ctx: &PolicyContext<'_>) -> Decision {
    if ctx.actor.is_admin() { Decision::Allow } else { Decision::Abstain }
}

fn feature_gate(ctx: &PolicyContext<'_>) -> Decision {
    if ctx.flags.enabled { Decision::Abstain } else { Decision::Deny }
}

fn participant_rule(ctx: &PolicyContext<'_>) -> Decision {
    let participant = ctx.thread.is_participant(ctx.actor.id);
    let allowed = match ctx.action {
        ChatAction::View | ChatAction::Close => participant,
        ChatAction::Post => participant && ctx.thread.is_open(),
    };
    if allowed { Decision::Allow } else { Decision::Deny }
}

static RULES: [Rule; 3] = [admin_override, feature_gate, participant_rule];

/// Authorization gate for chat threads. Evaluation has no side effects.
#[derive(Debug, Clone, Copy)]
pub struct ChatThreadPolicy {
    flags: ChatFlags,
}

impl ChatThreadPolicy {
    #[must_use]
    pub const fn new(flags: ChatFlags) -> Self {
        Self { flags }
    }

    #[must_use]
    pub fn authorize(&self, actor: &Actor, thread: &ChatThread, action: ChatAction) -> bool {
        let ctx = PolicyContext { actor, thread, action, flags: self.flags };
        RULES
            .iter()
            .map(|rule| rule(&ctx))
            .find(|decision| *decision != Decision::Abstain)
            .is_some_and(|decision| decision == Decision::Allow)
    }

    #[must_use]
    pub fn view(&self, actor: &Actor, thread: &ChatThread) -> bool {
        self.authorize(actor, thread, ChatAction::View)
    }

    #[must_use]
    pub fn post(&self, actor: &Actor, thread: &ChatThread) -> bool {
        self.authorize(actor, thread, ChatAction::Post)
    }

    /// Closing is allowed regardless of status; closing twice is a no-op further down.
    #[must_use]
    pub fn close(&self, actor: &Actor, thread: &ChatThread) -> bool {
        self.authorize(actor, thread, ChatAction::Close)
    }

    /// Whether the actor may start a new conversation at all.
    #[must_use]
    pub const fn open(&self, actor: &Actor) -> bool {
        actor.is_admin() || self.flags.enabled
    }
}
