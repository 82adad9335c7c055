//! Synthesizer prompt
//!
//! The template, its placeholder substitution, and the transcript replayed
//! into it on every pass.

use crate::parser::{OBSERVATION_LABEL, THOUGHT_PREFIX};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Instructional template for the action synthesizer.
///
/// Placeholders: `{api_url}`, `{api_docs}`, `{background}`, `{api_plan}`,
/// `{agent_scratchpad}`. Other braces are literal.
pub const CALLER_TEMPLATE: &str = r#"You are an agent that receives a plan of API calls together with the documentation of the endpoint involved. Execute the calls and report the outcome.
If a call fails, explain the problem; if you can fix the call, you may issue it again. Use ids as inputs to further calls, but report both ids and names back to the user.
Complete the API calls described by the plan.


API documentation:
Base url: {api_url}
Endpoints:
{api_docs}

A path segment written as "{name}" is a variable: replace it with the proper value. For example "/users/{user_id}/tweets" becomes "/users/42/tweets" for user 42. The final url must never contain "{" or "}".

Available request methods: GET, POST, PUT, PATCH, DELETE. Build the request parameters from the documentation and the plan.
The input must be a JSON object with three base keys: url, description, output_instructions.
"url" is a string.
"description" says what the API response is about, as specifically as possible.
"output_instructions" says, in natural language and in detail, which information to extract from the response, for example the id of a resource created by a POST request. It must never be "return the full response". It should carry over everything the plan asks for, including conditions such as filtering or sorting.
With GET, add a "params" key whose value is an object of query parameters.
With POST, PUT, PATCH or DELETE, add a "data" key whose value is an object holding the request body, plus "params" when query parameters are needed.
Separate every member with a comma and do not put a comma after the last one, so that the JSON stays valid.

Example 1:
Operation: POST
Input: {
    "url": "https://api.twitter.com/2/tweets",
    "params": {
        "tweet.fields": "created_at"
    },
    "data": {
        "text": "Hello world!"
    },
    "description": "The API response is a twitter object.",
    "output_instructions": "What is the id of the new twitter?"
}

Example 2:
Operation: GET
Input: {
    "url": "https://api.themoviedb.org/3/person/5026/movie_credits",
    "description": "The API response is the movie credit list of Akira Kurosawa (id 5026)",
    "output_instructions": "What are the names and ids of the movies directed by this person?"
}

Example 3:
Operation: PUT
Input: {
    "url": "https://api.spotify.com/v1/me/player/volume",
    "params": {
        "volume_percent": "20"
    },
    "description": "Set the volume for the current playback device."
}

You will receive background information and the plan to execute.
Background: facts you can use while executing the plan, e.g. the id of a person.
Plan: the API calls to execute.

Follow the plan exactly and give the execution result as soon as the planned calls succeed. Do not add steps or call APIs the plan does not mention. For example, if the plan is "GET /search/person to search for the director "Lee Chang dong"", do not go on to call "GET /person/{person_id}/movie_credits".

From here on, use this format:

Background: facts you can use while executing the plan
Plan: the API calls to execute
Thought: what to do next
Operation: the request method, one of GET, POST, PUT, PATCH, DELETE
Input: the JSON input of the operation
Response: the result of the operation
Thought: I have finished executing the plan (or: I cannot finish the plan without further information)
Execution Result: the outcome of the plan, based on the API responses

Rules for the execution result:
1. It must start with "Execution Result:".
2. Restate the response in natural language following the plan. For the plan "GET /search/person to search for the director "Lee Chang dong"" a good result is "Successfully called GET /search/person to search for the director "Lee Chang dong". The id of Lee Chang dong is xxxx". Avoid pronouns such as "this person".
3. When the plan says "most" (e.g. "the most trending TV show today"), pick the first item of the response.
4. Be verbose and include everything the plan asks for.
Begin!

Background: {background}
Plan: {api_plan}
Thought: {agent_scratchpad}
"#;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(api_url|api_docs|background|api_plan|agent_scratchpad)\}").expect("valid placeholder regex")
});

/// Values substituted into [`CALLER_TEMPLATE`].
#[derive(Debug, Clone, Default)]
pub struct PromptInputs<'a> {
    pub api_url: &'a str,
    pub api_docs: &'a str,
    pub background: &'a str,
    pub api_plan: &'a str,
    pub agent_scratchpad: &'a str,
}

/// Fill `template` in a single pass, so values containing placeholder text
/// are inserted literally.
pub fn render_template(template: &str, inputs: &PromptInputs<'_>) -> String {
    let values: HashMap<&str, &str> = HashMap::from([
        ("api_url", inputs.api_url),
        ("api_docs", inputs.api_docs),
        ("background", inputs.background),
        ("api_plan", inputs.api_plan),
        ("agent_scratchpad", inputs.agent_scratchpad),
    ]);
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values.get(&caps[1]).copied().unwrap_or_default().to_string()
        })
        .into_owned()
}

/// Render the ordered (synthesizer output, interpreted result) history.
///
/// The template already opens the scratchpad with a thought label, so each
/// step closes by opening the next thought.
pub fn render_transcript<S: AsRef<str>>(history: &[(S, S)]) -> String {
    let mut transcript = String::new();
    for (output, observation) in history {
        transcript.push_str(output.as_ref());
        transcript.push('\n');
        transcript.push_str(OBSERVATION_LABEL);
        transcript.push(' ');
        transcript.push_str(observation.as_ref());
        transcript.push('\n');
        transcript.push_str(THOUGHT_PREFIX);
    }
    transcript
}

/// Stop sequences that keep the model from writing its own observation.
pub fn stop_sequences() -> Vec<String> {
    vec![
        format!("\n{}", OBSERVATION_LABEL),
        format!("\n\t{}", OBSERVATION_LABEL),
    ]
}
