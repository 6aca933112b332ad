//! Listings command implementation

use super::{parse_address, Context};
use anyhow::{Context as _, Result};
use mercato_core::{ListingFilter, ListingRecord, ListingStatus};
use mercato_projector::ListingQuery;

pub fn execute(
    ctx: &Context,
    nft: Option<String>,
    seller: Option<String>,
    all: bool,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut filter = ListingFilter::new();
    if !all {
        filter = filter.status(ListingStatus::Active);
    }
    if let Some(nft) = nft {
        filter = filter.nft_address(parse_address("nft", &nft)?);
    }
    if let Some(seller) = seller {
        filter = filter.seller(parse_address("seller", &seller)?);
    }
    if let Some(limit) = limit {
        filter = filter.limit(limit);
    }

    let query = ListingQuery::new(ctx.open_store()?);
    let listings = query.list(&filter).context("Failed to query listings")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        println!("No listings");
        return Ok(());
    }

    print_table(&listings);
    Ok(())
}

fn print_table(listings: &[ListingRecord]) {
    println!(
        "{:<42}  {:>10}  {:<42}  {:>24}  {}",
        "NFT", "TOKEN", "SELLER", "PRICE", "STATUS"
    );
    for listing in listings {
        println!(
            "{:<42}  {:>10}  {:<42}  {:>24}  {}",
            mercato_core::types::lower_hex(&listing.nft_address),
            listing.token_id,
            mercato_core::types::lower_hex(&listing.seller),
            listing.price,
            listing.status()
        );
    }
    println!("\n{} listing(s)", listings.len());
}
