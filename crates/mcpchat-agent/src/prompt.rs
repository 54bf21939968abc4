//! System instruction for tool-augmented runs.

use std::fmt::Write as _;

use mcpchat_core::ServerTool;

/// Instruction listing every available tool and the rules for using them.
///
/// Injected ahead of the first user turn only.
pub fn build_system_instruction(tools: &[ServerTool]) -> String {
    let mut out = String::from(
        "You are a helpful assistant with access to external tools provided by MCP servers.\n\n\
         Available tools:\n",
    );

    for tool in tools {
        let _ = write!(out, "- {} (server: {})", tool.tool.name, tool.server_name);
        if let Some(description) = tool.tool.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, ": {description}");
        }
        out.push('\n');
    }

    out.push_str(
        "\nRules:\n\
         1. When a tool can answer the request or perform the action, you MUST call it \
         instead of answering from memory.\n\
         2. Never claim to have used a tool without calling it.\n\
         3. After receiving tool results, answer the user based on those results.\n\
         4. If a tool returns an error, explain the problem or try a different approach.\n",
    );
    out
}
