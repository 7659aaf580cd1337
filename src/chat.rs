/// Message-history wrapper over batch generation
///
/// Keeps the alternating user/model history that the API expects. A failed
/// send rolls the just-added user message back out of the history so the
/// same input can be resubmitted cleanly.

use anyhow::Result;

use crate::gemini::{Content, GeminiClient, Part};

pub struct ChatSession {
    client: GeminiClient,
    model: String,
    system_instruction: String,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(client: GeminiClient, model: &str, system_instruction: &str) -> Self {
        ChatSession {
            client,
            model: model.to_string(),
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        }
    }

    /// Send one user message and return the model's reply text
    pub fn send(&mut self, message: &str) -> Result<String> {
        self.push_user(message);

        let response = self.client.generate_content(
            &self.model,
            &self.history,
            Some(&self.system_instruction),
            None,
        );

        match response {
            Ok(response) => {
                let reply = response.text();
                self.push_model(&reply);
                Ok(reply)
            }
            Err(e) => {
                // Allow resubmission of the same input
                self.rollback_user();
                Err(e)
            }
        }
    }

    /// Like `send`, but streams the reply through `on_chunk` as it arrives
    pub fn send_streamed(
        &mut self,
        message: &str,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String> {
        self.push_user(message);

        let response = self.client.generate_content_stream(
            &self.model,
            &self.history,
            Some(&self.system_instruction),
            on_chunk,
        );

        match response {
            Ok(reply) => {
                self.push_model(&reply);
                Ok(reply)
            }
            Err(e) => {
                self.rollback_user();
                Err(e)
            }
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    fn push_user(&mut self, message: &str) {
        self.history.push(Content::user(vec![Part::text(message)]));
    }

    fn push_model(&mut self, reply: &str) {
        self.history.push(Content::model(vec![Part::text(reply)]));
    }

    fn rollback_user(&mut self) {
        self.history.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        let client = GeminiClient::new("test-key".to_string()).unwrap();
        ChatSession::new(client, "gemini-2.5-flash", "be brief")
    }

    #[test]
    fn test_history_alternates_roles() {
        let mut chat = session();
        chat.push_user("question");
        chat.push_model("answer");
        chat.push_user("follow-up");

        let roles: Vec<&str> = chat
            .history()
            .iter()
            .map(|c| c.role.as_deref().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_rollback_removes_last_user_message() {
        let mut chat = session();
        chat.push_user("question");
        chat.push_model("answer");
        chat.push_user("doomed");
        chat.rollback_user();

        assert_eq!(chat.history().len(), 2);
        assert_eq!(chat.history()[1].role.as_deref(), Some("model"));
    }
}
