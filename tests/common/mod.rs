//! Shared fixture: a small two-seat card game.
//!
//! Each seat holds a hand. On its turn a seat either plays a card or draws
//! one from the shuffled deck. Playing an `A` forces the next seat to
//! discard, which runs as a simultaneous sub-phase with that seat as the
//! only participant. Hands are visible to their owner only.

#![allow(dead_code)]

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use turnkit::actions::{ActionContext, ActionDef, AuthContext};
use turnkit::core::{EngineConfig, Fault, PlayerId, PlayerMap, Submission};
use turnkit::engine::{Engine, GameDef};
use turnkit::phases::{PhaseDef, PhaseRequest, PhaseTransition};
use turnkit::schema::Schema;
use turnkit::view::{conceal_unless, Visibility};

pub const PLAY: &str = "playCard";
pub const DRAW: &str = "drawCard";
pub const DISCARD: &str = "discardCard";

/// Cards dealt when the setup descriptor is `null`.
pub const DECK: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];
pub const HAND_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardTable {
    /// `None` marks a card the viewer may not see.
    pub hands: PlayerMap<Vec<Option<String>>>,
    pub deck: Vec<String>,
    pub played: Vec<String>,
    pub discard: Vec<String>,
    pub forced_discard: Option<PlayerId>,
}

impl CardTable {
    pub fn hand(&self, player: PlayerId) -> &[Option<String>] {
        &self.hands[player]
    }

    pub fn holds(&self, player: PlayerId, card: &str) -> bool {
        self.hands
            .get(player)
            .map_or(false, |hand| hand.iter().any(|c| c.as_deref() == Some(card)))
    }

    fn take(&mut self, player: PlayerId, card: &str) -> Result<String, Fault> {
        let hand = self
            .hands
            .get_mut(player)
            .ok_or_else(|| Fault::new(format!("no seat {}", player)))?;
        let at = hand
            .iter()
            .position(|c| c.as_deref() == Some(card))
            .ok_or_else(|| Fault::new(format!("{} does not hold {}", player, card)))?;
        hand.remove(at)
            .ok_or_else(|| Fault::new("hidden card in canonical state"))
    }
}

#[derive(Debug, Deserialize)]
pub struct CardPayload {
    pub card: String,
}

#[derive(Deserialize)]
struct Deal {
    hands: Vec<Vec<String>>,
    #[serde(default)]
    deck: Vec<String>,
}

fn card_schema() -> Schema {
    Schema::object().field("card", Schema::string().max_len(8))
}

fn seated(auth: &AuthContext<'_>, _: &CardTable) -> bool {
    auth.default_policy()
}

fn holds_card(auth: &AuthContext<'_>, payload: &CardPayload, table: &CardTable) -> bool {
    table.holds(auth.player, &payload.card)
}

pub fn card_game() -> GameDef<CardTable> {
    GameDef::new("cards", |ctx| {
        let (hands, deck) = if ctx.descriptor().is_null() {
            let mut deck: Vec<String> = DECK.iter().map(|c| c.to_string()).collect();
            deck.shuffle(&mut ctx.rng);
            let hands: Vec<Vec<String>> = (0..ctx.player_count())
                .map(|_| deck.split_off(deck.len().saturating_sub(HAND_SIZE)))
                .collect();
            (hands, deck)
        } else {
            let deal: Deal = ctx.parse_descriptor()?;
            if deal.hands.len() != ctx.player_count() {
                return Err(Fault::new("one hand per seat"));
            }
            (deal.hands, deal.deck)
        };

        Ok(CardTable {
            hands: PlayerMap::new(ctx.player_count(), |seat| {
                hands[seat.index()].iter().cloned().map(Some).collect()
            }),
            deck,
            played: Vec::new(),
            discard: Vec::new(),
            forced_discard: None,
        })
    })
    .with_phase(
        PhaseDef::sequential("main")
            .allow([PLAY, DRAW])
            .pass_turn_after([PLAY, DRAW])
            .end_when(|table: &CardTable, _| {
                if let Some(seat) = table.forced_discard {
                    PhaseTransition::Push(PhaseRequest::new("discard").with_participants([seat]))
                } else if table.deck.is_empty() && table.hands.iter().all(|(_, hand)| hand.is_empty()) {
                    PhaseTransition::End
                } else {
                    PhaseTransition::Continue
                }
            }),
    )
    .with_phase(
        PhaseDef::simultaneous("discard")
            .allow([DISCARD])
            .available_when(|table: &CardTable, seat| !table.hand(seat).is_empty()),
    )
    .with_action(
        ActionDef::new(PLAY, card_schema(), |ctx: &mut ActionContext<'_, CardTable>, p: &CardPayload| {
            let player = ctx.player();
            let card = ctx.state.take(player, &p.card)?;
            if card == "A" {
                let next = (player.index() + 1) % ctx.player_count();
                let target = PlayerId::new(next as u8);
                if !ctx.state.hand(target).is_empty() {
                    ctx.state.forced_discard = Some(target);
                }
            }
            ctx.state.played.push(card);
            Ok(())
        })
        .with_precheck(seated)
        .with_authorize(holds_card),
    )
    .with_action(ActionDef::new(
        DRAW,
        Schema::Null,
        |ctx: &mut ActionContext<'_, CardTable>, _: &()| {
            if ctx.state.deck.is_empty() {
                return Err(Fault::new("deck is empty"));
            }
            let at = ctx.rng.gen_range(0..ctx.state.deck.len());
            let card = ctx.state.deck.remove(at);
            let seat = ctx.player();
            ctx.state.hands[seat].push(Some(card));
            Ok(())
        },
    )
    .with_precheck(|auth, table: &CardTable| auth.default_policy() && !table.deck.is_empty()))
    .with_action(
        ActionDef::new(DISCARD, card_schema(), |ctx: &mut ActionContext<'_, CardTable>, p: &CardPayload| {
            let player = ctx.player();
            let card = ctx.state.take(player, &p.card)?;
            ctx.state.discard.push(card);
            ctx.state.forced_discard = None;
            Ok(())
        })
        .with_precheck(seated)
        .with_authorize(holds_card),
    )
    .with_mask(|table: &CardTable, viewer| {
        let mut view = table.clone();
        for (owner, hand) in view.hands.iter_mut() {
            conceal_unless(Visibility::OwnerOnly, Some(owner), viewer, hand.iter_mut());
        }
        conceal_unless(Visibility::Hidden, None, viewer, view.deck.iter_mut());
        view
    })
}

/// Setup descriptor with fixed hands and deck.
pub fn deal(hands: &[&[&str]], deck: &[&str]) -> Value {
    json!({ "hands": hands, "deck": deck })
}

/// Route engine logs to the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two seats: p1 holds A and B, p2 holds C and D, one card left to draw.
pub fn scripted_engine() -> Engine<CardTable> {
    init_tracing();
    Engine::new(
        card_game(),
        EngineConfig::new(2).with_seed(7),
        deal(&[&["A", "B"], &["C", "D"]], &["E"]),
    )
    .expect("scripted setup")
}

/// Two seats dealt from the shuffled deck.
pub fn shuffled_engine(seed: u64) -> Engine<CardTable> {
    init_tracing();
    Engine::new(
        card_game(),
        EngineConfig::new(2).with_seed(seed).with_checkpoint_interval(4),
        Value::Null,
    )
    .expect("shuffled setup")
}

pub fn p(seat: u8) -> PlayerId {
    PlayerId::new(seat)
}

pub fn play(seat: u8, card: &str) -> Submission {
    Submission::new(PLAY, json!({ "card": card }), p(seat))
}

pub fn draw(seat: u8) -> Submission {
    Submission::new(DRAW, Value::Null, p(seat))
}

pub fn discard(seat: u8, card: &str) -> Submission {
    Submission::new(DISCARD, json!({ "card": card }), p(seat))
}

/// A submission built from three arbitrary bytes.
///
/// Covers legal moves, wrong seats, unheld cards and malformed payloads.
pub fn arbitrary_submission(seat: u8, kind: u8, card: u8) -> Submission {
    let name = DECK[card as usize % DECK.len()];
    match kind % 5 {
        0 | 1 => play(seat, name),
        2 => draw(seat),
        3 => discard(seat, name),
        _ => Submission::new(PLAY, json!({ "card": card }), p(seat)),
    }
}
