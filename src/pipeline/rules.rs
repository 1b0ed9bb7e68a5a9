//! Event classifier — decides what a message does to its conversation.
//!
//! Classification is pure: it looks at the event and the current session
//! only, and never touches storage. Ordered checks, first match wins:
//! - bulk campaign from the business → suppressed before any lookup
//! - menu prompt to a customer without a session → open session
//! - customer without a sector typing 1–8 → select sector; 9 or 10 → cancel
//! - agent message to a customer in service → close, redirect, or hold

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Phrasebook, SectorTable};
use crate::pipeline::types::{MessageEvent, SessionRecord, Transition};

static SELECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-8]$").expect("selection regex"));

static CANCELLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(9|10)$").expect("cancellation regex"));

static REDIRECT_SECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)para\s+o\s+setor\s+(.+?)\.").expect("redirect regex"));

// ── Holding replies ─────────────────────────────────────────────────

/// Agent boilerplate that does not count as serving the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingReply {
    /// "forwarding you to an attendant"
    Forwarding,
    /// "we are closed at the moment"
    Closed,
    /// "attendants are on lunch break"
    LunchBreak,
}

impl HoldingReply {
    pub const ALL: [HoldingReply; 3] = [Self::Forwarding, Self::Closed, Self::LunchBreak];

    pub fn phrase(self, phrases: &Phrasebook) -> &str {
        match self {
            Self::Forwarding => &phrases.forwarding,
            Self::Closed => &phrases.closed,
            Self::LunchBreak => &phrases.lunch_break,
        }
    }

    /// First holding reply whose phrase occurs in `body`.
    ///
    /// Case and whitespace runs are ignored on both sides.
    pub fn detect(body: &str, phrases: &Phrasebook) -> Option<Self> {
        let body = normalize(body);
        Self::ALL
            .into_iter()
            .find(|reply| contains_phrase(&body, reply.phrase(phrases)))
    }
}

/// Lower-case and collapse whitespace runs to a single space.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `normalized_body` must already be normalized. Empty phrases never match.
fn contains_phrase(normalized_body: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    !phrase.is_empty() && normalized_body.contains(&phrase)
}

/// Literal substring check. Empty needles never match.
fn contains_literal(body: &str, needle: &str) -> bool {
    !needle.is_empty() && body.contains(needle)
}

// ── Classifier ──────────────────────────────────────────────────────

/// Classifier configured with a sector table and phrasebook.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    sectors: SectorTable,
    phrases: Phrasebook,
}

impl ClassifierRules {
    pub fn new(sectors: SectorTable, phrases: Phrasebook) -> Self {
        Self { sectors, phrases }
    }

    /// Mass campaign sent by the business. Must be checked before any lookup.
    pub fn is_bulk_broadcast(&self, event: &MessageEvent) -> bool {
        event.from_self && contains_literal(&event.body, &self.phrases.bulk_marker)
    }

    /// Decide the transition for `event` given the conversation's session.
    ///
    /// Bulk broadcasts classify as `Ignore` here; callers are expected to
    /// drop them with [`is_bulk_broadcast`](Self::is_bulk_broadcast) first.
    pub fn classify(&self, event: &MessageEvent, session: Option<&SessionRecord>) -> Transition {
        if self.is_bulk_broadcast(event) {
            return Transition::Ignore;
        }

        let transition = match session {
            None => self.classify_without_session(event),
            Some(session) if session.awaiting_selection() => self.classify_selection(event),
            Some(session) => self.classify_in_service(event, session),
        };

        debug!(
            id = %event.id,
            key = %event.conversation_key(),
            from_self = event.from_self,
            transition = transition.label(),
            "Event classified"
        );
        transition
    }

    fn classify_without_session(&self, event: &MessageEvent) -> Transition {
        if event.from_self && contains_literal(&event.body, &self.phrases.menu_prompt) {
            Transition::OpenSession
        } else {
            Transition::Ignore
        }
    }

    fn classify_selection(&self, event: &MessageEvent) -> Transition {
        if event.from_self {
            return Transition::Ignore;
        }

        let body = event.body.trim();
        if SELECTION.is_match(body) {
            // A relabelled table may not cover every digit
            match self.sectors.label(body) {
                Some(sector) => Transition::SelectSector {
                    option: body.to_string(),
                    sector: sector.to_string(),
                },
                None => Transition::Ignore,
            }
        } else if CANCELLATION.is_match(body) {
            Transition::CancelSession
        } else {
            Transition::Ignore
        }
    }

    fn classify_in_service(&self, event: &MessageEvent, session: &SessionRecord) -> Transition {
        if !event.from_self || session.service_window().is_none() {
            return Transition::Ignore;
        }

        match HoldingReply::detect(&event.body, &self.phrases) {
            None => Transition::CloseWithReply,
            Some(_) if self.is_redirect(&event.body) => Transition::Redirect {
                sector: extract_redirect_sector(&event.body),
            },
            Some(reply) => Transition::Hold { reply },
        }
    }

    fn is_redirect(&self, body: &str) -> bool {
        contains_phrase(&normalize(body), &self.phrases.redirect)
    }
}

/// Sector named in "... para o setor <X>." or empty when absent.
pub fn extract_redirect_sector(body: &str) -> String {
    REDIRECT_SECTOR
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::pipeline::types::RowPosition;

    const CUSTOMER: &str = "5511999990000@c.us";
    const BUSINESS: &str = "5511888880000@c.us";

    fn rules() -> ClassifierRules {
        ClassifierRules::new(SectorTable::default(), Phrasebook::default())
    }

    fn from_agent(body: &str) -> MessageEvent {
        MessageEvent::new(true, BUSINESS, CUSTOMER, body)
    }

    fn from_customer(body: &str) -> MessageEvent {
        MessageEvent::new(false, CUSTOMER, BUSINESS, body)
    }

    fn selecting() -> SessionRecord {
        SessionRecord::new(CUSTOMER)
    }

    fn in_service() -> SessionRecord {
        SessionRecord::new(CUSTOMER).with_selection("Entrega", Utc::now(), RowPosition(4))
    }

    #[test]
    fn bulk_marker_from_self_is_broadcast() {
        let rules = rules();
        let event = from_agent("Promoção! !!!!! Colocar a mensagem aqui !!!!!! Aproveite");
        assert!(rules.is_bulk_broadcast(&event));
        assert_eq!(rules.classify(&event, Some(&in_service())), Transition::Ignore);
    }

    #[test]
    fn bulk_marker_from_customer_is_not_broadcast() {
        let event = from_customer("!!!!! Colocar a mensagem aqui !!!!!!");
        assert!(!rules().is_bulk_broadcast(&event));
    }

    #[test]
    fn menu_prompt_opens_session() {
        let event = from_agent("Olá! Por favor digite o número da opção que você deseja:\n1 - Comercial");
        assert_eq!(rules().classify(&event, None), Transition::OpenSession);
    }

    #[test]
    fn menu_prompt_from_customer_is_ignored() {
        let event = from_customer("Por favor digite o número da opção que você deseja");
        assert_eq!(rules().classify(&event, None), Transition::Ignore);
    }

    #[test]
    fn menu_prompt_with_existing_session_does_not_reopen() {
        let event = from_agent("Por favor digite o número da opção que você deseja");
        assert_eq!(rules().classify(&event, Some(&selecting())), Transition::Ignore);
    }

    #[test]
    fn digit_selects_sector() {
        let transition = rules().classify(&from_customer("3"), Some(&selecting()));
        assert_eq!(
            transition,
            Transition::SelectSector {
                option: "3".into(),
                sector: "Contas a Pagar (Fornecedores)".into(),
            }
        );
    }

    #[test]
    fn selection_tolerates_surrounding_whitespace() {
        let transition = rules().classify(&from_customer("  8\n"), Some(&selecting()));
        assert!(matches!(
            transition,
            Transition::SelectSector { ref sector, .. } if sector == "Elogios ou Reclamações"
        ));
    }

    #[test]
    fn nine_and_ten_cancel() {
        let rules = rules();
        assert_eq!(
            rules.classify(&from_customer("9"), Some(&selecting())),
            Transition::CancelSession
        );
        assert_eq!(
            rules.classify(&from_customer(" 10 "), Some(&selecting())),
            Transition::CancelSession
        );
    }

    #[test]
    fn other_bodies_are_ignored_while_selecting() {
        let rules = rules();
        for body in ["0", "11", "3a", "três", "1 2", ""] {
            assert_eq!(
                rules.classify(&from_customer(body), Some(&selecting())),
                Transition::Ignore,
                "body {body:?}"
            );
        }
    }

    #[test]
    fn agent_message_while_selecting_is_ignored() {
        assert_eq!(
            rules().classify(&from_agent("3"), Some(&selecting())),
            Transition::Ignore
        );
    }

    #[test]
    fn relabelled_table_without_digit_ignores_selection() {
        let rules = ClassifierRules::new(
            SectorTable::from_pairs([("1", "Vendas")]),
            Phrasebook::default(),
        );
        assert_eq!(
            rules.classify(&from_customer("2"), Some(&selecting())),
            Transition::Ignore
        );
        assert!(matches!(
            rules.classify(&from_customer("1"), Some(&selecting())),
            Transition::SelectSector { .. }
        ));
    }

    #[test]
    fn substantive_agent_reply_closes() {
        let event = from_agent("Bom dia! Sou a Ana, em que posso ajudar?");
        assert_eq!(rules().classify(&event, Some(&in_service())), Transition::CloseWithReply);
    }

    #[test]
    fn holding_replies_hold() {
        let rules = rules();
        let cases = [
            ("Olá, estou encaminhando para atendimento.", HoldingReply::Forwarding),
            ("Estamos fechados no momento. Voltamos às 8h.", HoldingReply::Closed),
            ("Nossos atendentes estão em horário de almoço", HoldingReply::LunchBreak),
        ];
        for (body, expected) in cases {
            assert_eq!(
                rules.classify(&from_agent(body), Some(&in_service())),
                Transition::Hold { reply: expected },
                "body {body:?}"
            );
        }
    }

    #[test]
    fn holding_reply_detection_ignores_case_and_spacing() {
        let phrases = Phrasebook::default();
        assert_eq!(
            HoldingReply::detect("ESTAMOS  FECHADOS\nno momento", &phrases),
            Some(HoldingReply::Closed)
        );
        assert_eq!(HoldingReply::detect("Estamos abertos", &phrases), None);
    }

    #[test]
    fn empty_phrase_never_matches() {
        let phrases = Phrasebook {
            closed: String::new(),
            ..Phrasebook::default()
        };
        assert_eq!(HoldingReply::detect("qualquer coisa", &phrases), None);
    }

    #[test]
    fn customer_message_in_service_is_ignored() {
        assert_eq!(
            rules().classify(&from_customer("Alô?"), Some(&in_service())),
            Transition::Ignore
        );
    }

    #[test]
    fn redirect_extracts_sector() {
        let event = from_agent(
            "Olá, estou encaminhando para atendimento. Você está sendo redirecionado(a) para o setor Entrega.",
        );
        assert_eq!(
            rules().classify(&event, Some(&in_service())),
            Transition::Redirect {
                sector: "Entrega".into()
            }
        );
    }

    #[test]
    fn redirect_without_sector_records_empty() {
        let event = from_agent(
            "estou encaminhando para atendimento - Você está sendo redirecionado(a) para o setor",
        );
        assert_eq!(
            rules().classify(&event, Some(&in_service())),
            Transition::Redirect {
                sector: String::new()
            }
        );
    }

    #[test]
    fn redirect_sector_tolerates_case_and_spacing() {
        let event = from_agent(
            "Estou encaminhando para atendimento. Você está sendo redirecionado(a) PARA O  SETOR\nFinanceiro.",
        );
        assert_eq!(
            rules().classify(&event, Some(&in_service())),
            Transition::Redirect {
                sector: "Financeiro".into()
            }
        );
        assert_eq!(extract_redirect_sector("Para o Setor Entrega."), "Entrega");
    }

    #[test]
    fn redirect_phrase_without_holding_reply_closes() {
        let event = from_agent("Você está sendo redirecionado(a) para o setor Comercial.");
        assert_eq!(rules().classify(&event, Some(&in_service())), Transition::CloseWithReply);
    }

    #[test]
    fn extract_redirect_sector_is_lazy() {
        assert_eq!(
            extract_redirect_sector("para o setor Recursos Humanos. Aguarde. Obrigado."),
            "Recursos Humanos"
        );
        assert_eq!(extract_redirect_sector("sem setor"), "");
    }
}
