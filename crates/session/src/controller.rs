//! The game controller: turn arbitration between humans and the engine.
//!
//! The controller is synchronous. Every state change goes through
//! [`GameController::advance`], which first charges elapsed time to the
//! clock and then processes at most one input (a human move or an engine
//! reply). A flag that falls during the charge is settled after the input:
//! a move that ends the game wins over the flag, otherwise the side whose
//! time ran out loses.
//!
//! Engine work is asynchronous. The controller only issues requests on its
//! [`EngineClient`] and later receives [`EngineReply`] values as input. A
//! reply whose id is not the pending request is discarded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chess_core::{Color, DrawKind, Move, Position, Rules, RulesError, SearchBudget, Verdict};
use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::config::{FallbackPolicy, SessionOptions};
use crate::engine::{EngineAnswer, EngineClient, EngineReply, Evaluation, RequestId, RequestKind, SearchReport};
use crate::error::{EngineError, MoveRejection, SessionError};
use crate::events::SessionEvent;
use crate::move_log::{self, LogEntry};
use crate::persistence;
use crate::state::{Actor, DrawReason, GameMode, GameSetup, Outcome, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingMove(Color),
    EngineThinking(Color),
    /// The engine failed and the session waits for [`GameController::retry_engine`].
    EngineStalled(Color),
    Paused(Color),
    GameOver(Outcome),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingMove(side) => write!(f, "awaiting {side}'s move"),
            Phase::EngineThinking(side) => write!(f, "the engine is thinking for {side}"),
            Phase::EngineStalled(side) => write!(f, "the engine has stalled playing {side}"),
            Phase::Paused(_) => write!(f, "paused"),
            Phase::GameOver(outcome) => write!(f, "the game is over ({outcome})"),
        }
    }
}

/// Input processed by one update cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    HumanMove(Move),
    Engine(EngineReply),
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: RequestId,
    kind: RequestKind,
}

pub struct GameController {
    rules: Arc<dyn Rules>,
    engine: EngineClient,
    options: SessionOptions,
    state: SessionState,
    phase: Phase,
    pending: Option<Pending>,
    /// Side whose flag fell during the current cycle
    flagged: Option<Color>,
    /// The clock is stopped while a hint is computed
    hint_holds_clock: bool,
    evaluation: Option<Evaluation>,
    events: Vec<SessionEvent>,
}

impl GameController {
    pub fn new(
        rules: Arc<dyn Rules>,
        engine: EngineClient,
        options: SessionOptions,
        setup: &GameSetup,
    ) -> Result<Self, SessionError> {
        Self::from_state(rules, engine, options, SessionState::new(setup))
    }

    /// Continue a game from a previously saved state.
    pub fn from_state(
        rules: Arc<dyn Rules>,
        engine: EngineClient,
        options: SessionOptions,
        state: SessionState,
    ) -> Result<Self, SessionError> {
        let phase = Phase::Paused(state.side_to_move());
        let mut controller = Self {
            rules,
            engine,
            options,
            state,
            phase,
            pending: None,
            flagged: None,
            hint_holds_clock: false,
            evaluation: None,
            events: Vec::new(),
        };
        controller.start()?;
        Ok(controller)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn position(&self) -> &Position {
        &self.state.position
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn rules(&self) -> &dyn Rules {
        self.rules.as_ref()
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::GameOver(_))
    }

    /// Id of the engine request the controller is waiting on.
    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending.map(|p| p.id)
    }

    /// The most recent evaluation received from the engine.
    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn legal_moves(&self) -> Result<Vec<Move>, SessionError> {
        Ok(self.rules.legal_moves(&self.state.position)?)
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run one update cycle: charge `elapsed`, process `input`, then settle
    /// a fallen flag.
    pub fn advance(&mut self, elapsed: Duration, input: Option<Input>) -> Result<(), SessionError> {
        self.charge(elapsed);
        let result = match input {
            None => Ok(()),
            Some(Input::HumanMove(mv)) => self.play_human(mv),
            Some(Input::Engine(reply)) => self.on_engine_reply(reply),
        };
        self.settle_flag();
        result
    }

    pub fn tick(&mut self, elapsed: Duration) {
        self.charge(elapsed);
        self.settle_flag();
    }

    pub fn apply_human_move(&mut self, mv: Move) -> Result<(), SessionError> {
        self.advance(Duration::ZERO, Some(Input::HumanMove(mv)))
    }

    pub fn handle_engine_reply(&mut self, reply: EngineReply) -> Result<(), SessionError> {
        self.advance(Duration::ZERO, Some(Input::Engine(reply)))
    }

    pub fn request_hint(&mut self) -> Result<RequestId, SessionError> {
        let Phase::AwaitingMove(_) = self.phase else {
            return Err(SessionError::InvalidPhase(self.phase.to_string()));
        };
        if let Some(pending) = self.pending.filter(|p| p.kind == RequestKind::Hint) {
            return Ok(pending.id);
        }
        self.abandon_request();
        let id = self.engine.best_move(
            RequestKind::Hint,
            self.state.position.clone(),
            self.options.hint_budget,
        );
        self.pending = Some(Pending {
            id,
            kind: RequestKind::Hint,
        });
        if self.options.pause_clock_during_hint && self.state.clock.is_running() {
            self.state.clock.pause();
            self.hint_holds_clock = true;
        }
        debug!(request = id, "hint requested");
        Ok(id)
    }

    /// Ask the engine to evaluate the current position. The result arrives
    /// as [`SessionEvent::EvaluationReady`].
    pub fn request_evaluation(&mut self, depth: Option<u8>) -> Result<RequestId, SessionError> {
        if let Phase::EngineThinking(_) = self.phase {
            return Err(SessionError::InvalidPhase(self.phase.to_string()));
        }
        self.abandon_request();
        let depth = depth.unwrap_or(self.options.analysis_depth);
        let id = self.engine.evaluate(self.state.position.clone(), depth);
        self.pending = Some(Pending {
            id,
            kind: RequestKind::Evaluation,
        });
        Ok(id)
    }

    /// Take back the last move.
    ///
    /// Allowed in human-vs-human games, or in any mode while paused.
    pub fn undo_last(&mut self) -> Result<(), SessionError> {
        let paused = match self.phase {
            Phase::GameOver(_) | Phase::EngineThinking(_) => return Err(SessionError::UndoNotPermitted),
            Phase::Paused(_) => true,
            Phase::AwaitingMove(_) | Phase::EngineStalled(_) => false,
        };
        if !paused && self.state.mode != GameMode::HumanVsHuman {
            return Err(SessionError::UndoNotPermitted);
        }
        let entry = self.state.log.pop().ok_or(SessionError::NothingToUndo)?;
        self.abandon_request();

        self.state.position = self.state.log.current_position().clone();
        self.state.clock = entry.clock_before;
        self.state.ply -= 1;
        self.state.draw_offer = None;

        let side = self.state.side_to_move();
        self.phase = if paused {
            self.state.clock.pause();
            Phase::Paused(side)
        } else {
            Phase::AwaitingMove(side)
        };
        info!(ply = self.state.ply, undone = %entry.san, "move taken back");
        self.events.push(SessionEvent::MoveUndone {
            ply: self.state.ply,
            position: self.state.position.clone(),
        });
        Ok(())
    }

    pub fn resign(&mut self, side: Color) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.finish(Outcome::Resignation { loser: side });
        Ok(())
    }

    pub fn offer_draw(&mut self, side: Color) -> Result<(), SessionError> {
        self.ensure_live()?;
        if self.state.mode.actor(side) != Actor::Human {
            return Err(SessionError::InvalidPhase(format!("{side} is played by the engine")));
        }
        self.state.draw_offer = Some(side);
        info!(%side, "draw offered");
        self.events.push(SessionEvent::DrawOffered(side));
        Ok(())
    }

    /// Accept the opponent's open offer. Engines never accept.
    pub fn accept_draw(&mut self, side: Color) -> Result<(), SessionError> {
        self.ensure_live()?;
        if self.state.draw_offer != Some(side.other()) || self.state.mode.actor(side) != Actor::Human {
            return Err(SessionError::NoDrawOffer);
        }
        self.finish(Outcome::Draw {
            reason: DrawReason::Agreement,
        });
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        let side = match self.phase {
            Phase::GameOver(_) => return Err(SessionError::InvalidPhase(self.phase.to_string())),
            Phase::Paused(_) => return Ok(()),
            Phase::AwaitingMove(side) | Phase::EngineThinking(side) | Phase::EngineStalled(side) => side,
        };
        self.abandon_request();
        self.state.clock.pause();
        self.phase = Phase::Paused(side);
        info!("session paused");
        self.events.push(SessionEvent::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        let Phase::Paused(_) = self.phase else {
            return Err(SessionError::InvalidPhase(self.phase.to_string()));
        };
        info!("session resumed");
        self.events.push(SessionEvent::Resumed);
        self.dispatch();
        Ok(())
    }

    /// Ask the engine again after a stall.
    pub fn retry_engine(&mut self) -> Result<(), SessionError> {
        let Phase::EngineStalled(side) = self.phase else {
            return Err(SessionError::InvalidPhase(self.phase.to_string()));
        };
        info!(%side, "retrying engine");
        self.dispatch();
        Ok(())
    }

    pub fn new_game(&mut self, setup: &GameSetup) -> Result<(), SessionError> {
        self.replace_state(SessionState::new(setup))
    }

    pub fn save(&self) -> Result<Vec<u8>, SessionError> {
        Ok(persistence::save(&self.state)?)
    }

    /// Replace the running game with a saved one. On error the running game
    /// is left untouched.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let state = persistence::load_verified(bytes, self.rules.as_ref())?;
        self.replace_state(state)
    }

    /// Abandon engine work and stop the clock.
    pub fn close(&mut self) {
        self.abandon_request();
        self.state.clock.pause();
    }

    /// Close the session and stop the engine worker.
    pub async fn shutdown(mut self) {
        self.close();
        self.engine.shutdown().await;
    }

    fn replace_state(&mut self, state: SessionState) -> Result<(), SessionError> {
        self.abandon_request();
        self.flagged = None;
        self.evaluation = None;
        self.state = state;
        self.engine.new_game();
        self.start()
    }

    fn start(&mut self) -> Result<(), SessionError> {
        info!(id = %self.state.id, mode = %self.state.mode, ply = self.state.ply, "session started");
        self.events.push(SessionEvent::SessionStarted {
            id: self.state.id,
            mode: self.state.mode,
        });
        let outcome = match self.state.outcome {
            Outcome::Ongoing => self.judge()?,
            done => done,
        };
        if outcome.is_terminal() {
            self.state.clock.pause();
            self.state.outcome = outcome;
            self.phase = Phase::GameOver(outcome);
        } else {
            self.dispatch();
        }
        Ok(())
    }

    /// Hand the turn to whoever plays the side to move.
    fn dispatch(&mut self) {
        let side = self.state.side_to_move();
        self.state.clock.start(side);
        match self.state.mode.actor(side) {
            Actor::Human => self.phase = Phase::AwaitingMove(side),
            Actor::Engine => {
                let budget = SearchBudget::depth(self.state.difficulty.depth());
                let kind = RequestKind::Move(side);
                let id = self.engine.best_move(kind, self.state.position.clone(), budget);
                self.pending = Some(Pending { id, kind });
                self.phase = Phase::EngineThinking(side);
                debug!(request = id, %side, "engine to move");
                self.events.push(SessionEvent::EngineThinking { side, request: id });
            }
        }
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::GameOver(_) => Err(SessionError::InvalidPhase(self.phase.to_string())),
            _ => Ok(()),
        }
    }

    fn charge(&mut self, elapsed: Duration) {
        if let Some(side) = self.state.clock.tick(elapsed) {
            debug!(%side, "flag fell");
            self.flagged = Some(side);
        }
    }

    fn settle_flag(&mut self) {
        let Some(side) = self.flagged.take() else {
            return;
        };
        if self.is_over() {
            return;
        }
        self.events.push(SessionEvent::ClockExpired(side));
        self.finish(Outcome::TimeForfeit { loser: side });
    }

    fn play_human(&mut self, mv: Move) -> Result<(), SessionError> {
        match self.phase {
            Phase::AwaitingMove(_) => {}
            Phase::GameOver(_) => return Err(SessionError::rejected(mv, MoveRejection::GameOver)),
            _ => return Err(SessionError::rejected(mv, MoveRejection::NotYourTurn)),
        }
        let legal = self.validate(mv)?;
        self.abandon_request();
        self.apply_validated(legal, Actor::Human)
    }

    /// Match `mv` against the legal moves, picking up the oracle's flags.
    fn validate(&self, mv: Move) -> Result<Move, SessionError> {
        let legal = self.rules.legal_moves(&self.state.position)?;
        let mut same_route = legal.iter().filter(|m| m.from == mv.from && m.to == mv.to);
        let Some(first) = same_route.next() else {
            return Err(SessionError::rejected(mv, MoveRejection::NotLegal));
        };
        if mv.promo.is_none() && first.promo.is_some() {
            return Err(SessionError::AmbiguousPromotion(mv.to_string()));
        }
        legal
            .iter()
            .find(|m| m.same_squares(&mv))
            .copied()
            .ok_or_else(|| SessionError::rejected(mv, MoveRejection::NotLegal))
    }

    /// The single place where a move changes the game.
    fn apply_validated(&mut self, mv: Move, by: Actor) -> Result<(), SessionError> {
        let before = &self.state.position;
        let side = before.side_to_move;
        let san = move_log::san(self.rules.as_ref(), before, mv)?;
        let after = self.rules.apply_move(before, mv)?;

        let clock_before = self.state.clock.clone();
        self.state.clock.add_increment(side);
        self.state.log.push(LogEntry {
            mv,
            side,
            san: san.clone(),
            position: after.clone(),
            clock_before,
            played_at: Utc::now(),
        });
        self.state.position = after.clone();
        self.state.ply += 1;
        // An offer lapses once the opponent plays on
        if self.state.draw_offer == Some(side.other()) {
            self.state.draw_offer = None;
        }

        info!(ply = self.state.ply, %side, %san, "move played");
        self.events.push(SessionEvent::MoveApplied {
            ply: self.state.ply,
            side,
            by,
            mv,
            san,
            position: after,
        });

        let outcome = self.judge()?;
        if outcome.is_terminal() {
            self.finish(outcome);
        } else {
            self.dispatch();
        }
        Ok(())
    }

    fn judge(&self) -> Result<Outcome, RulesError> {
        let pos = &self.state.position;
        let outcome = match self.rules.verdict(pos)? {
            Verdict::Checkmate => Outcome::Checkmate {
                winner: pos.side_to_move.other(),
            },
            Verdict::Stalemate => Outcome::Stalemate,
            Verdict::Draw(DrawKind::FiftyMoveRule) => Outcome::Draw {
                reason: DrawReason::FiftyMoveRule,
            },
            Verdict::Draw(DrawKind::InsufficientMaterial) => Outcome::Draw {
                reason: DrawReason::InsufficientMaterial,
            },
            Verdict::Ongoing if self.state.log.repetition_count(pos) >= 3 => Outcome::Draw {
                reason: DrawReason::ThreefoldRepetition,
            },
            Verdict::Ongoing => Outcome::Ongoing,
        };
        Ok(outcome)
    }

    fn finish(&mut self, outcome: Outcome) {
        self.abandon_request();
        self.state.clock.pause();
        self.state.outcome = outcome;
        self.state.draw_offer = None;
        self.phase = Phase::GameOver(outcome);
        info!(%outcome, result = outcome.result_string(), ply = self.state.ply, "game over");
        self.events.push(SessionEvent::GameEnded(outcome));
    }

    fn abandon_request(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(request = pending.id, kind = ?pending.kind, "abandoning engine request");
            self.engine.cancel();
        }
        self.release_hint_clock();
    }

    fn release_hint_clock(&mut self) {
        if std::mem::take(&mut self.hint_holds_clock) {
            if let Phase::AwaitingMove(side) = self.phase {
                self.state.clock.start(side);
            }
        }
    }

    fn on_engine_reply(&mut self, reply: EngineReply) -> Result<(), SessionError> {
        let Some(pending) = self.pending.filter(|p| p.id == reply.id) else {
            debug!(request = reply.id, "discarding stale engine reply");
            return Ok(());
        };
        self.pending = None;
        self.engine.finished(reply.id);
        match pending.kind {
            RequestKind::Move(side) => self.on_engine_move(side, reply),
            RequestKind::Hint => {
                self.release_hint_clock();
                self.on_hint(reply);
                Ok(())
            }
            RequestKind::Evaluation => {
                self.on_evaluation(reply);
                Ok(())
            }
        }
    }

    fn on_engine_move(&mut self, side: Color, reply: EngineReply) -> Result<(), SessionError> {
        if self.phase != Phase::EngineThinking(side) {
            debug!(request = reply.id, phase = %self.phase, "engine move arrived out of phase");
            return Ok(());
        }
        let proposed = match reply.result {
            Ok(EngineAnswer::Search(SearchReport {
                best_move: Some(mv), ..
            })) => mv,
            Ok(EngineAnswer::Search(_)) => {
                let err = EngineError::Protocol("engine returned no move".into());
                return self.engine_failed(side, reply.id, err);
            }
            Ok(EngineAnswer::Evaluation(_)) => {
                let err = EngineError::Protocol("evaluation returned for a move request".into());
                return self.engine_failed(side, reply.id, err);
            }
            Err(err) => return self.engine_failed(side, reply.id, err),
        };
        match self.validate(proposed) {
            Ok(mv) => self.apply_validated(mv, Actor::Engine),
            Err(e) => {
                let err = EngineError::Protocol(format!("engine proposed {proposed}: {e}"));
                self.engine_failed(side, reply.id, err)
            }
        }
    }

    fn engine_failed(&mut self, side: Color, request: RequestId, err: EngineError) -> Result<(), SessionError> {
        let policy = self.options.fallback;
        warn!(%side, error = %err, ?policy, "engine failed to produce a move");
        self.events.push(SessionEvent::EngineUnavailable {
            request,
            side: Some(side),
            reason: err.to_string(),
        });
        match policy {
            FallbackPolicy::Resign => {
                self.events.push(SessionEvent::FallbackApplied { side, policy });
                self.finish(Outcome::Resignation { loser: side });
                Ok(())
            }
            FallbackPolicy::RandomMove => {
                let legal = self.rules.legal_moves(&self.state.position)?;
                let Some(&mv) = legal.choose(&mut rand::thread_rng()) else {
                    // Nothing to play; the position itself decides the game
                    let outcome = self.judge()?;
                    self.finish(outcome);
                    return Ok(());
                };
                self.events.push(SessionEvent::FallbackApplied { side, policy });
                self.apply_validated(mv, Actor::Engine)
            }
            FallbackPolicy::PauseAndRetry => {
                self.state.clock.pause();
                self.phase = Phase::EngineStalled(side);
                self.events.push(SessionEvent::FallbackApplied { side, policy });
                Ok(())
            }
        }
    }

    fn on_hint(&mut self, reply: EngineReply) {
        let request = reply.id;
        let proposed = match reply.result {
            Ok(EngineAnswer::Search(SearchReport {
                best_move: Some(mv), ..
            })) => mv,
            Ok(_) => return self.request_failed(request, "engine returned no move".into()),
            Err(e) => return self.request_failed(request, e.to_string()),
        };
        match self.validate(proposed) {
            Ok(mv) => {
                self.state.hints_used.push(self.state.position.fullmove_number);
                info!(hint = %mv, "hint ready");
                self.events.push(SessionEvent::HintReady { request, mv });
            }
            Err(e) => self.request_failed(request, format!("engine proposed {proposed}: {e}")),
        }
    }

    fn request_failed(&mut self, request: RequestId, reason: String) {
        warn!(request, %reason, "engine request failed");
        self.events.push(SessionEvent::EngineUnavailable {
            request,
            side: None,
            reason,
        });
    }

    fn on_evaluation(&mut self, reply: EngineReply) {
        let request = reply.id;
        match reply.result {
            Ok(EngineAnswer::Evaluation(evaluation)) => {
                let white_centipawns = evaluation.white_centipawns(self.state.side_to_move());
                debug!(request, white_centipawns, depth = evaluation.depth, "evaluation ready");
                self.evaluation = Some(evaluation.clone());
                self.events.push(SessionEvent::EvaluationReady {
                    request,
                    evaluation,
                    white_centipawns,
                });
            }
            Ok(EngineAnswer::Search(_)) => {
                self.request_failed(request, "search returned for an evaluation request".into())
            }
            Err(e) => self.request_failed(request, e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
