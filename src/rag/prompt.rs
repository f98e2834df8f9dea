use crate::database::lancedb::QueryResult;

/// Join retrieved chunks into the context block, one chunk per line
#[inline]
pub fn assemble_context(result: &QueryResult) -> String {
    result.chunks().join("\n")
}

/// Build the log-analysis prompt for `question` grounded on `context`
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a log analysis assistant.

Context:
{context}

---

User Question:
{question}

---

Instructions:
1. First, answer the user's question concisely.
2. If there are any errors, exceptions, or failure traces in the context, identify and explain them clearly.
3. Based on the question and logs, provide recommendations or next steps to resolve the issue or improve the system.
4. If there's nothing critical, still suggest possible improvements or sanity checks.

Give a helpful and actionable response.
"
    )
}
