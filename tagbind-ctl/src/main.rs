use anyhow::Context;
use tagbind_api::{NewTag, SetInjected, SetStatus, TagId};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create a tag
    Create {
        /// Explicit tag identifier; generated when omitted
        tag_id: Option<String>,
    },

    /// List tags
    List {
        /// Filter by status (available, claimed, disabled)
        #[structopt(long)]
        status: Option<String>,

        /// Filter by owner user id
        #[structopt(long)]
        owner: Option<String>,

        /// Filter by injected flag
        #[structopt(long)]
        injected: Option<bool>,

        #[structopt(long, default_value = "1000")]
        limit: i64,

        #[structopt(long, default_value = "0")]
        offset: i64,
    },

    /// Delete a tag
    Delete {
        /// Tag identifier
        tag_id: String,
    },

    /// Mark whether the physical tag has been written with its URL
    SetInjected {
        /// Tag identifier
        tag_id: String,

        /// New value of the injected flag
        #[structopt(parse(try_from_str))]
        injected: bool,
    },

    /// Force a tag's status to available or disabled
    SetStatus {
        /// Tag identifier
        tag_id: String,

        /// New status (available or disabled)
        status: String,
    },
}

fn admin_token() -> anyhow::Result<String> {
    std::env::var("ADMIN_TOKEN").context("retrieving ADMIN_TOKEN environment variable")
}

async fn show(resp: reqwest::Response) -> anyhow::Result<()> {
    let resp = resp.error_for_status()?;
    let body: serde_json::Value = resp.json().await.context("parsing response body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = reqwest::Client::new();
    let token = admin_token()?;

    match opt.cmd {
        Command::Create { tag_id } => {
            show(
                client
                    .post(format!("{}/api/admin/tags", opt.host))
                    .json(&NewTag {
                        tag_id: tag_id.map(TagId),
                    })
                    .bearer_auth(token)
                    .send()
                    .await?,
            )
            .await?;
        }
        Command::List {
            status,
            owner,
            injected,
            limit,
            offset,
        } => {
            let mut query = vec![
                (String::from("limit"), limit.to_string()),
                (String::from("offset"), offset.to_string()),
            ];
            if let Some(status) = status {
                query.push((String::from("status"), status));
            }
            if let Some(owner) = owner {
                query.push((String::from("owner_id"), owner));
            }
            if let Some(injected) = injected {
                query.push((String::from("is_injected"), injected.to_string()));
            }
            show(
                client
                    .get(format!("{}/api/admin/tags", opt.host))
                    .query(&query)
                    .bearer_auth(token)
                    .send()
                    .await?,
            )
            .await?;
        }
        Command::Delete { tag_id } => {
            show(
                client
                    .delete(format!("{}/api/admin/tags/{}", opt.host, tag_id))
                    .bearer_auth(token)
                    .send()
                    .await?,
            )
            .await?;
        }
        Command::SetInjected { tag_id, injected } => {
            show(
                client
                    .put(format!("{}/api/admin/tags/{}/injected", opt.host, tag_id))
                    .json(&SetInjected {
                        is_injected: injected,
                    })
                    .bearer_auth(token)
                    .send()
                    .await?,
            )
            .await?;
        }
        Command::SetStatus { tag_id, status } => {
            let status = serde_json::from_value(serde_json::Value::String(status))
                .context("status must be available or disabled")?;
            show(
                client
                    .put(format!("{}/api/admin/tags/{}/status", opt.host, tag_id))
                    .json(&SetStatus { status })
                    .bearer_auth(token)
                    .send()
                    .await?,
            )
            .await?;
        }
    }

    Ok(())
}
