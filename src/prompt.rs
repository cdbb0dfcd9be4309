//! Prompt construction for the memory rewrite task.
//!
//! Renders the coaching instruction sent to the model. The prompt embeds
//! the trader's insight, the requested tone, and the agent the trader last
//! interacted with, and asks for a JSON object with exactly the fields
//! `rewritten`, `tags`, and `emoji`.

/// Build the rewrite prompt for a single trading insight.
pub fn build_rewrite_prompt(content: &str, tone: &str, agent: &str) -> String {
    let mut prompt = String::with_capacity(512 + content.len());

    prompt.push_str(&format!(
        "You are a trading psychology coach. Rewrite the following trading \
         insight using a {tone} tone for a trader who recently interacted \
         with the {agent} agent. Include a relevant emoji and hashtags. \
         Make it concise, emotionally intelligent, and easy to recall.\n\n"
    ));

    prompt.push_str(&format!("Insight: \"{content}\"\n\n"));

    prompt.push_str(
        "Respond in JSON:\n\
         {\n\
           \"rewritten\": \"...\",\n\
           \"tags\": [\"#tag1\", \"#tag2\"],\n\
           \"emoji\": \"🔥\"\n\
         }\n",
    );

    prompt
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_all_fields() {
        let prompt = build_rewrite_prompt("Cut losses early", "encouraging", "general");
        assert!(prompt.contains("Cut losses early"));
        assert!(prompt.contains("encouraging tone"));
        assert!(prompt.contains("the general agent"));
    }

    #[test]
    fn test_prompt_requests_json_fields() {
        let prompt = build_rewrite_prompt("x", "stern", "risk");
        assert!(prompt.contains("\"rewritten\""));
        assert!(prompt.contains("\"tags\""));
        assert!(prompt.contains("\"emoji\""));
    }

    #[test]
    fn test_prompt_quotes_insight() {
        let prompt = build_rewrite_prompt("Size down after two losses", "calm", "risk");
        assert!(prompt.contains("Insight: \"Size down after two losses\""));
    }
}
