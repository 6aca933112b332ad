//! Show command implementation

use super::{parse_address, parse_token_id, Context};
use anyhow::{Context as _, Result};
use mercato_core::types::lower_hex;
use mercato_projector::ListingQuery;

pub fn execute(
    ctx: &Context,
    nft: String,
    token_id: String,
    viewer: Option<String>,
    json: bool,
) -> Result<()> {
    let nft_address = parse_address("nft", &nft)?;
    let token_id = parse_token_id(&token_id)?;
    let viewer = viewer
        .map(|v| parse_address("viewer", &v))
        .transpose()?;

    let query = ListingQuery::new(ctx.open_store()?);
    let view = query
        .listing_for_token(nft_address, token_id, viewer)
        .context("Failed to query listing")?;

    let view = match view {
        Some(view) => view,
        None => {
            if json {
                println!("null");
            } else {
                println!("No listing for {} #{}", lower_hex(&nft_address), token_id);
            }
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let record = &view.record;
    println!("\nListing {}", record.id);
    println!("{}", "=".repeat(60));
    println!("NFT:      {}", lower_hex(&record.nft_address));
    println!("Token:    {}", record.token_id);
    println!("Seller:   {}", lower_hex(&record.seller));
    println!("Price:    {}", record.price);
    match &record.buyer {
        Some(buyer) => println!("Status:   sold to {}", lower_hex(buyer)),
        None => println!("Status:   active"),
    }
    if view.is_owner {
        println!("\nYou own this listing");
    }

    Ok(())
}
