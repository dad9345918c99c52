use crate::model::feed::FeedKey;
use crate::model::signaling::{
    IceCandidatePayload, SessionDescription, SignalKind, SignalMessage, SignalPayload,
};
use crate::model::state::NegotiationRole;
use serde::{Deserialize, Serialize};

/// The single mutable document a relay keeps per feed.
///
/// Writers never replace it; they merge a [`RelayPatch`] field by field, so an offer, an answer
/// and the latest candidate can coexist. Only `type`, `role` and `timestamp` describe the most
/// recent write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SignalKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidatePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<NegotiationRole>,
    #[serde(default)]
    pub space_id: String,
    #[serde(default)]
    pub feed_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A partial write to a [`RelayDocument`]. Absent fields are left untouched by the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SignalKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidatePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<NegotiationRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,
}

impl RelayPatch {
    /// Builds the write for one outgoing message: only the field matching the payload is set.
    pub fn for_payload(feed_key: &FeedKey, role: NegotiationRole, payload: SignalPayload) -> Self {
        let mut patch = Self {
            kind: Some(payload.kind()),
            role: Some(role),
            space_id: Some(feed_key.space_id.clone()),
            feed_id: Some(feed_key.feed_id.clone()),
            ..Default::default()
        };

        match payload {
            SignalPayload::Offer(offer) => patch.offer = Some(offer),
            SignalPayload::Answer(answer) => patch.answer = Some(answer),
            SignalPayload::IceCandidate(candidate) => patch.candidate = Some(candidate),
        }

        patch
    }
}

impl RelayDocument {
    pub fn feed_key(&self) -> FeedKey {
        FeedKey::new(self.space_id.clone(), self.feed_id.clone())
    }

    /// Field-level merge; the relay stamps every write with its own timestamp.
    pub fn merge(&mut self, patch: RelayPatch, timestamp: u64) {
        if let Some(kind) = patch.kind {
            self.kind = Some(kind);
        }
        if let Some(offer) = patch.offer {
            self.offer = Some(offer);
        }
        if let Some(answer) = patch.answer {
            self.answer = Some(answer);
        }
        if let Some(candidate) = patch.candidate {
            self.candidate = Some(candidate);
        }
        if patch.role.is_some() {
            self.role = patch.role;
        }
        if let Some(space_id) = patch.space_id {
            self.space_id = space_id;
        }
        if let Some(feed_id) = patch.feed_id {
            self.feed_id = feed_id;
        }
        self.timestamp = Some(timestamp);
    }

    /// Reads the message described by the most recent write, if the snapshot carries one.
    ///
    /// A snapshot without `type` or `timestamp`, or whose `type` names a field that is absent,
    /// decodes to nothing.
    pub fn decode(&self) -> Option<SignalMessage> {
        let kind = self.kind?;
        let timestamp = self.timestamp?;

        let payload = match kind {
            SignalKind::Offer => SignalPayload::Offer(self.offer.clone()?),
            SignalKind::Answer => SignalPayload::Answer(self.answer.clone()?),
            SignalKind::IceCandidate => SignalPayload::IceCandidate(self.candidate.clone()?),
        };

        Some(SignalMessage::new(self.feed_key(), timestamp, payload))
    }
}
