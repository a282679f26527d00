// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled class with capacity-bounded enrollment and a FIFO waitlist.
//!
//! Enrollment rules:
//! - `enrolled_members.len() <= capacity` always holds
//! - a member is in at most one of `enrolled_members` / `wait_list`
//! - `wait_list` keeps insertion order, the head is promoted first

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored class record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Class ID (also used as document ID)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructor: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub capacity: u32,
    #[serde(default)]
    pub enrolled_members: Vec<String>,
    #[serde(default)]
    pub wait_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Successful result of an enroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    Waitlisted,
}

impl EnrollOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            EnrollOutcome::Enrolled => "Member enrolled successfully",
            EnrollOutcome::Waitlisted => "Class is full. Member added to waitlist.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Member already enrolled in this class")]
    AlreadyEnrolled,
}

impl Class {
    fn has_free_seat(&self) -> bool {
        (self.enrolled_members.len() as u64) < u64::from(self.capacity)
    }

    /// Enroll a member, or append them to the waitlist when the class is full.
    ///
    /// A waitlisted member who enrolls while a seat is free moves from the
    /// waitlist into the enrolled set.
    pub fn enroll(
        &mut self,
        member_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EnrollOutcome, EnrollmentError> {
        if self.enrolled_members.iter().any(|m| m == member_id) {
            return Err(EnrollmentError::AlreadyEnrolled);
        }

        let outcome = if self.has_free_seat() {
            self.wait_list.retain(|m| m != member_id);
            self.enrolled_members.push(member_id.to_string());
            EnrollOutcome::Enrolled
        } else {
            if !self.wait_list.iter().any(|m| m == member_id) {
                self.wait_list.push(member_id.to_string());
            }
            EnrollOutcome::Waitlisted
        };

        self.updated_at = now;
        Ok(outcome)
    }

    /// Remove a member from both lists, then promote at most one waitlisted
    /// member into a free seat.
    ///
    /// Returns the promoted member ID, if any. Removing an absent member is a no-op.
    pub fn unenroll(&mut self, member_id: &str, now: DateTime<Utc>) -> Option<String> {
        self.enrolled_members.retain(|m| m != member_id);
        self.wait_list.retain(|m| m != member_id);
        self.updated_at = now;

        if self.wait_list.is_empty() || !self.has_free_seat() {
            return None;
        }

        let promoted = self.wait_list.remove(0);
        self.enrolled_members.push(promoted.clone());
        Some(promoted)
    }
}
